//! Experiments: a single set of parameters describing a run, loadable from JSON.
//!
//! # Example
//!
//! ```rust
//! use rusty_epidemic::core::network::Network;
//! use rusty_epidemic::experiment::{simulate, Parameters};
//! use rusty_epidemic::simulator::result::Termination;
//!
//! let params = Parameters::from_json(r#"{
//!     "model": { "sis": { "p_infect": 0.4, "p_recover": 0.2 } },
//!     "seeding": { "count": 2 },
//!     "scheduler": "synchronous",
//!     "max_time": 50.0,
//!     "seed": 7
//! }"#).unwrap();
//!
//! let edges: Vec<(usize, usize)> = (0..8).map(|n| (n, (n + 1) % 8)).collect();
//! let result = simulate(Network::from_edges(8, &edges).unwrap(), &params).unwrap();
//! assert!(matches!(result.termination, Termination::Exhausted | Termination::MaxTime));
//! ```
use derivative::Derivative;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::network::Network;
use crate::core::process::{Process, Seeding};
use crate::error::EpiError;
use crate::simulator::dynamics::{Dynamics, Scheduler, SimulationConfig};
use crate::simulator::result::RunResult;

/// A ready-made process and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    Sir {
        p_infect: f64,
        p_remove: f64,
    },
    Sis {
        p_infect: f64,
        p_recover: f64,
    },
    Seir {
        p_infect_asymptomatic: f64,
        p_infect: f64,
        p_symptoms: f64,
        p_remove: f64,
    },
}

impl Model {
    /// Build the process described by the model.
    pub fn process(&self, seeding: Seeding) -> Result<Process, EpiError> {
        match *self {
            Model::Sir { p_infect, p_remove } => Process::sir(p_infect, p_remove, seeding),
            Model::Sis {
                p_infect,
                p_recover,
            } => Process::sis(p_infect, p_recover, seeding),
            Model::Seir {
                p_infect_asymptomatic,
                p_infect,
                p_symptoms,
                p_remove,
            } => Process::seir(
                p_infect_asymptomatic,
                p_infect,
                p_symptoms,
                p_remove,
                seeding,
            ),
        }
    }
}

/// The parameters of an experiment.
#[derive(Derivative, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct Parameters {
    #[derivative(Default(value = "Model::Sir { p_infect: 0.1, p_remove: 0.05 }"))]
    pub model: Model,
    #[derivative(Default(value = "Seeding::Count(1)"))]
    pub seeding: Seeding,
    #[derivative(Default(value = "Scheduler::Stochastic"))]
    pub scheduler: Scheduler,
    /// Stopping bounds and observation options, read from the same level as the other fields.
    #[serde(flatten)]
    pub config: SimulationConfig,
    /// The seed of the run's random generator.
    pub seed: u64,
}

impl Parameters {
    /// Read parameters from a JSON document; missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self, EpiError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the parameters as a JSON document.
    pub fn to_json(&self) -> Result<String, EpiError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the process of the experiment.
    pub fn process(&self) -> Result<Process, EpiError> {
        self.model.process(self.seeding.clone())
    }

}

/// Run one experiment on a network, with a generator seeded from the parameters.
///
/// The function returns an error if the parameters are invalid or if the run is aborted.
pub fn simulate(network: Network, params: &Parameters) -> Result<RunResult, EpiError> {
    let process = params.process()?;
    let rng = ChaCha8Rng::seed_from_u64(params.seed);

    let mut dynamics = Dynamics::new(params.scheduler, params.config.clone());
    dynamics.set_up(network, process, rng)?;
    let result = dynamics.run();
    dynamics.tear_down();
    result
}
