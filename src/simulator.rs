//! Simulation framework for compartmented processes over networks.
//!
//! - `dynamics`: The orchestrator binding a process to a network and driving it until termination.
//! - `synchronous`: Discrete-time scheduling, one sweep over all eligible elements per tick.
//! - `stochastic`: Continuous-time, event-driven scheduling.
//! - `schedule`: Events posted at fixed times, possibly repeating.
//! - `monitor`: Regular sampling of compartment and locus sizes.
//! - `result`: The result record of a run.
//!
//! # Example
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rusty_epidemic::core::compartment::Compartment;
//! use rusty_epidemic::core::network::Network;
//! use rusty_epidemic::core::process::{Process, Seeding};
//! use rusty_epidemic::simulator::dynamics::{Dynamics, Scheduler, SimulationConfig};
//!
//! // A ring of 10 nodes with a single infected node
//! let edges: Vec<(usize, usize)> = (0..10).map(|n| (n, (n + 1) % 10)).collect();
//! let network = Network::from_edges(10, &edges).unwrap();
//! let process = Process::sis(0.5, 0.2, Seeding::Count(1)).unwrap();
//!
//! // Run the synchronous dynamics for 100 ticks, observing the process every 10 ticks
//! let config = SimulationConfig { max_time: 100.0, observation_interval: Some(10.0), ..SimulationConfig::default() };
//! let mut dynamics = Dynamics::new(Scheduler::Synchronous, config);
//! dynamics.set_up(network, process, ChaCha8Rng::seed_from_u64(42)).unwrap();
//! let result = dynamics.run().unwrap();
//!
//! assert_eq!(result.count(Compartment::Susceptible) + result.count(Compartment::Infected), 10);
//! assert!(result.timeseries.unwrap().times.len() <= 11);
//! ```

pub mod dynamics;
pub mod monitor;
pub mod result;
pub mod schedule;
mod stochastic;
mod synchronous;
