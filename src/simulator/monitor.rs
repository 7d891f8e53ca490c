//! Regular observation of a running process.
//!
//! The state of the network is piecewise constant between events: the monitor samples it at
//! times 0, Δ, 2Δ, ... by recording, just before the clock moves past a sample time, the state
//! in force at that time.
use crate::core::compartment::Compartment;
use crate::core::loci::Loci;
use crate::error::EpiError;

use super::result::TimeSeries;

/// Samples compartment counts and locus sizes every `interval` units of simulation time.
#[derive(Debug, Clone)]
pub struct Monitor {
    interval: f64,
    compartments: Vec<Compartment>,
    series: TimeSeries,
}

impl Monitor {
    /// Create a monitor sampling every `interval` units of simulation time.
    pub fn build(
        interval: f64,
        compartments: &[Compartment],
        loci: &Loci,
    ) -> Result<Self, EpiError> {
        if !(interval.is_finite() && interval > 0.0) {
            return Err(EpiError::InvalidParameter(format!(
                "observation interval {} must be positive and finite",
                interval
            )));
        }

        let mut series = TimeSeries::default();
        for &c in compartments {
            series.compartments.insert(c, vec![]);
        }
        for (_, name) in loci.iter() {
            series.loci.insert(name.to_string(), vec![]);
        }

        Ok(Monitor {
            interval,
            compartments: compartments.to_vec(),
            series,
        })
    }

    fn next_time(&self) -> f64 {
        self.series.times.len() as f64 * self.interval
    }

    fn observe(&mut self, t: f64, counts: &[usize], loci: &Loci) {
        self.series.times.push(t);
        for c in self.compartments.iter() {
            if let Some(values) = self.series.compartments.get_mut(c) {
                values.push(counts[c.index()]);
            }
        }
        for (id, name) in loci.iter() {
            if let Some(values) = self.series.loci.get_mut(name) {
                values.push(loci.size(id));
            }
        }
    }

    /// Sample every pending time strictly before `t`, using the current state.
    pub fn observe_before(&mut self, t: f64, counts: &[usize], loci: &Loci) {
        while self.next_time() < t {
            let s = self.next_time();
            self.observe(s, counts, loci);
        }
    }

    /// Sample every pending time up to and including `t`, using the current state.
    pub fn observe_through(&mut self, t: f64, counts: &[usize], loci: &Loci) {
        while self.next_time() <= t {
            let s = self.next_time();
            self.observe(s, counts, loci);
        }
    }

    /// Consume the monitor and return the time series sampled so far.
    pub fn into_series(self) -> TimeSeries {
        self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loci::Predicate;
    use crate::core::network::Network;

    use Compartment::{Infected, Susceptible};

    #[test]
    fn test_invalid_interval() {
        let network = Network::new(1);
        let loci = Loci::new(&network);
        assert!(Monitor::build(0.0, &[Infected], &loci).is_err());
        assert!(Monitor::build(f64::INFINITY, &[Infected], &loci).is_err());
    }

    #[test]
    fn test_samples_piecewise_constant_state() {
        let mut network = Network::from_edges(2, &[(0, 1)]).unwrap();
        let mut loci = Loci::new(&network);
        loci.register(Predicate::Nodes(Infected), "I", &network)
            .unwrap();
        loci.relabel(&mut network, 0, Infected).unwrap();
        loci.relabel(&mut network, 1, Susceptible).unwrap();

        let mut monitor = Monitor::build(0.5, &[Susceptible, Infected], &loci).unwrap();
        let mut counts = [1, 0, 1, 0];

        // an event at t = 1.2 infects node 1: samples 0.0, 0.5 and 1.0 see the old state
        monitor.observe_before(1.2, &counts, &loci);
        loci.relabel(&mut network, 1, Infected).unwrap();
        counts = [0, 0, 2, 0];
        monitor.observe_through(2.0, &counts, &loci);

        let series = monitor.into_series();
        assert_eq!(series.times, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(series.compartments[&Infected], vec![1, 1, 1, 2, 2]);
        assert_eq!(series.compartments[&Susceptible], vec![1, 1, 1, 0, 0]);
        assert_eq!(series.loci["I"], vec![1, 1, 1, 2, 2]);
    }
}
