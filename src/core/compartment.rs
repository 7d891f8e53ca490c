//! Compartments, i.e., the disease states a node can be in.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A compartment of a compartmented model of disease.
///
/// The set is closed: every process (SIR, SIS, SEIR or a custom one) declares the subset it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Compartment {
    /// Nodes that can catch the disease.
    #[serde(rename = "S")]
    Susceptible,
    /// Nodes that caught the disease and pass it on without symptoms.
    #[serde(rename = "E")]
    Exposed,
    /// Nodes that are symptomatic and infectious.
    #[serde(rename = "I")]
    Infected,
    /// Nodes that recovered or were removed.
    #[serde(rename = "R")]
    Removed,
}

impl Compartment {
    /// The number of compartments.
    pub const COUNT: usize = 4;

    /// All compartments, in index order.
    pub const ALL: [Compartment; Compartment::COUNT] = [
        Compartment::Susceptible,
        Compartment::Exposed,
        Compartment::Infected,
        Compartment::Removed,
    ];

    /// Returns the dense index of the compartment, suitable for indexing per-compartment tables.
    pub fn index(&self) -> usize {
        match self {
            Compartment::Susceptible => 0,
            Compartment::Exposed => 1,
            Compartment::Infected => 2,
            Compartment::Removed => 3,
        }
    }

    /// Returns the short name of the compartment.
    pub fn name(&self) -> &'static str {
        match self {
            Compartment::Susceptible => "S",
            Compartment::Exposed => "E",
            Compartment::Infected => "I",
            Compartment::Removed => "R",
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
