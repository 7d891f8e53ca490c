//! This crate provides tools for simulating compartmented processes, such as epidemics, over
//! networks in Rust.
//!
//! # Building Networks
//!
//! ```rust
//! use rusty_epidemic::core::network::Network;
//!
//! // A triangle with a pendant node
//! let mut network = Network::from_edges(4, &[(0, 1), (1, 2), (2, 0)]).unwrap();
//! network.add_edge(2, 3).unwrap();
//!
//! assert_eq!(network.num_nodes(), 4);
//! assert_eq!(network.num_edges(), 4);
//! assert_eq!(network.neighbors(2).unwrap().count(), 3);
//! ```
//!
//! # Declaring Processes
//!
//! The SIR, SIS and SEIR processes come ready-made. Other processes are declared as a table of
//! event rules, each happening at a locus of the network.
//!
//! ```rust
//! use rusty_epidemic::core::compartment::Compartment;
//! use rusty_epidemic::core::loci::Predicate;
//! use rusty_epidemic::core::process::{Effect, EventRule, Process, Seeding};
//!
//! // Infected nodes spontaneously recover, and susceptible nodes are vaccinated at a fixed rate
//! let process = Process::build(
//!     "SIR with vaccination",
//!     vec![Compartment::Susceptible, Compartment::Infected, Compartment::Removed],
//!     Compartment::Infected,
//!     Compartment::Susceptible,
//!     Seeding::Fraction(0.05),
//!     vec![
//!         EventRule::per_element("infect", Predicate::Edges(Compartment::Susceptible, Compartment::Infected), 0.3, Effect::Infect(Compartment::Infected)),
//!         EventRule::per_element("remove", Predicate::Nodes(Compartment::Infected), 0.1, Effect::Transition(Compartment::Removed)),
//!         EventRule::fixed_rate("vaccinate", Predicate::Nodes(Compartment::Susceptible), 0.5, Effect::Transition(Compartment::Removed)),
//!     ],
//! ).unwrap();
//!
//! assert_eq!(process.rules().len(), 3);
//! ```
//!
//! # Simulating Processes
//!
//! ```rust
//! use rusty_epidemic::core::compartment::Compartment;
//! use rusty_epidemic::core::network::Network;
//! use rusty_epidemic::experiment::{simulate, Model, Parameters};
//! use rusty_epidemic::simulator::dynamics::Scheduler;
//!
//! // A complete graph on 20 nodes
//! let mut edges = vec![];
//! for u in 0..20 {
//!     for v in (u + 1)..20 {
//!         edges.push((u, v));
//!     }
//! }
//! let network = Network::from_edges(20, &edges).unwrap();
//!
//! let params = Parameters {
//!     model: Model::Sir { p_infect: 0.2, p_remove: 1.0 },
//!     scheduler: Scheduler::Stochastic,
//!     seed: 42,
//!     ..Parameters::default()
//! };
//! let result = simulate(network, &params).unwrap();
//!
//! // an SIR epidemic always dies out
//! assert_eq!(result.count(Compartment::Infected), 0);
//! assert_eq!(result.count(Compartment::Susceptible) + result.count(Compartment::Removed), 20);
//! ```

pub mod core;
pub mod error;
pub mod experiment;
pub mod simulator;

/// The default maximum simulation time of a run.
pub const DEFAULT_MAX_TIME: f64 = 20000.0;
