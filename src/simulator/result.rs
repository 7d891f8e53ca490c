//! The result record handed back at the end of a run.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::compartment::Compartment;
use crate::core::loci::Element;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No event could happen anymore.
    Exhausted,
    /// The maximum simulation time was reached.
    MaxTime,
    /// The maximum number of events was reached.
    MaxEvents,
    /// All the compartments watched for extinction became empty.
    Extinct,
}

impl Termination {
    /// Returns true if the run was cut short by a configured bound rather than ending on its own.
    pub fn is_bound(&self) -> bool {
        matches!(self, Termination::MaxTime | Termination::MaxEvents)
    }
}

/// An event applied during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// The simulation time of the event.
    pub time: f64,
    /// The name of the event rule.
    pub event: String,
    /// The element the event happened at.
    pub element: Element,
}

/// Compartment counts and locus sizes sampled at regular times.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    /// The sample times.
    pub times: Vec<f64>,
    /// The size of each compartment at each sample time.
    pub compartments: BTreeMap<Compartment, Vec<usize>>,
    /// The size of each locus at each sample time.
    pub loci: BTreeMap<String, Vec<usize>>,
}

/// The outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// The name of the process.
    pub process: String,
    /// The final size of each declared compartment.
    pub compartments: BTreeMap<Compartment, usize>,
    /// The final simulation time.
    pub elapsed_time: f64,
    /// The number of events applied.
    pub num_events: u64,
    /// The number of steps taken, i.e., ticks (synchronous) or drawn events (stochastic).
    pub num_steps: u64,
    /// Why the run stopped.
    pub termination: Termination,
    /// The sampled time series, if observation was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeseries: Option<TimeSeries>,
    /// The ordered list of applied events, if recording was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<EventRecord>>,
}

impl RunResult {
    /// Returns the final size of a compartment (zero if the process does not declare it).
    pub fn count(&self, compartment: Compartment) -> usize {
        self.compartments.get(&compartment).copied().unwrap_or(0)
    }
}
