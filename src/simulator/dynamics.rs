//! The dynamics driving a process forward in time over a network.
//!
//! A [`Dynamics`] is a small state machine: it is created uninitialized, bound to a network,
//! a process and a random generator by [`Dynamics::set_up`], advanced step by step (or all at
//! once with [`Dynamics::run`]) until it terminates, and released by [`Dynamics::tear_down`].
//! Each step is delegated to one of two schedulers, chosen at construction:
//!
//! - [`Scheduler::Synchronous`]: discrete time, every eligible element tries its events once per tick;
//! - [`Scheduler::Stochastic`]: continuous time, one event at a time (Gillespie's algorithm).
//!
//! Besides the rate-driven events of the process, events can be posted to happen at fixed times
//! (see [`PostedEvent`]), either in the configuration or while running.
//!
//! All randomness comes from the generator handed over at set up, so a seeded generator makes
//! the whole run reproducible.
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rusty_epidemic::core::compartment::Compartment;
//! use rusty_epidemic::core::network::Network;
//! use rusty_epidemic::core::process::{Process, Seeding};
//! use rusty_epidemic::simulator::dynamics::{Dynamics, Scheduler, SimulationConfig};
//! use rusty_epidemic::simulator::result::Termination;
//!
//! // Two connected nodes, one of them infected, and no removal
//! let network = Network::from_edges(2, &[(0, 1)]).unwrap();
//! let process = Process::sir(1.0, 0.0, Seeding::Nodes(vec![0])).unwrap();
//!
//! let mut dynamics = Dynamics::new(Scheduler::Stochastic, SimulationConfig::default());
//! dynamics.set_up(network, process, ChaCha8Rng::seed_from_u64(42)).unwrap();
//! let result = dynamics.run().unwrap();
//!
//! assert_eq!(result.termination, Termination::Exhausted);
//! assert_eq!(result.count(Compartment::Infected), 2);
//! assert_eq!(result.num_events, 1);
//!
//! let network = dynamics.tear_down().unwrap();
//! assert_eq!(network.contact_tree(), vec![0]);
//! ```
use derivative::Derivative;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::mem;

use crate::core::compartment::Compartment;
use crate::core::loci::{Element, Loci, LocusId, Predicate};
use crate::core::network::{Network, NodeId};
use crate::core::process::{Process, Transition};
use crate::error::EpiError;
use crate::DEFAULT_MAX_TIME;

use super::monitor::Monitor;
use super::result::{EventRecord, RunResult, Termination};
use super::schedule::{PostedEvent, Schedule};
use super::{stochastic, synchronous};

/// The scheduling strategy of the dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheduler {
    /// Discrete-time synchronous sweeps; rule rates are per-tick probabilities.
    Synchronous,
    /// Continuous-time event-driven simulation; rule rates are per-unit-time intensities.
    Stochastic,
}

/// Stopping bounds and observation options of a run.
#[derive(Derivative, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct SimulationConfig {
    /// The maximum simulation time.
    #[derivative(Default(value = "DEFAULT_MAX_TIME"))]
    pub max_time: f64,
    /// The maximum number of events, if any.
    pub max_events: Option<u64>,
    /// Stop as soon as all these compartments are empty (ignored if empty).
    pub stop_when_empty: Vec<Compartment>,
    /// Sample compartment counts and locus sizes at this interval, if any.
    pub observation_interval: Option<f64>,
    /// Record every applied event.
    pub record_events: bool,
    /// Check every locus against the network after every step.
    #[derivative(Default(value = "cfg!(debug_assertions)"))]
    pub validate_loci: bool,
    /// Events posted at set up, on top of the rate-driven events of the process.
    pub posted_events: Vec<PostedEvent>,
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), EpiError> {
        if self.max_time.is_nan() || self.max_time <= 0.0 {
            return Err(EpiError::InvalidParameter(format!(
                "maximum time {} must be positive",
                self.max_time
            )));
        }
        Ok(())
    }
}

/// The outcome of a single engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// The process moved forward.
    Advanced,
    /// No event can happen anymore.
    Exhausted,
    /// The next event would happen after the maximum time.
    Bounded,
}

/// Everything a single run owns: the network, the process, the loci, the clock and the generator.
#[derive(Debug)]
pub(crate) struct Run<R> {
    pub(crate) network: Network,
    pub(crate) process: Process,
    pub(crate) loci: Loci,
    // locus of each rule, in rule order
    pub(crate) rule_loci: Vec<LocusId>,
    pub(crate) rng: R,
    pub(crate) clock: f64,
    pub(crate) num_events: u64,
    pub(crate) num_steps: u64,
    pub(crate) schedule: Schedule,
    counts: [usize; Compartment::COUNT],
    monitor: Option<Monitor>,
    events: Option<Vec<EventRecord>>,
}

impl<R: Rng> Run<R> {
    fn build(
        mut network: Network,
        process: Process,
        mut rng: R,
        config: &SimulationConfig,
    ) -> Result<Self, EpiError> {
        let mut loci = Loci::new(&network);
        let rule_loci = process.initialize(&mut network, &mut loci, &mut rng)?;

        let mut counts = [0; Compartment::COUNT];
        for node in network.nodes() {
            match network.compartment(node)? {
                Some(c) => counts[c.index()] += 1,
                None => {
                    return Err(EpiError::InvariantViolation(format!(
                        "node {} has no compartment after initialization",
                        node
                    )))
                }
            }
        }

        let monitor = config
            .observation_interval
            .map(|interval| Monitor::build(interval, process.compartments(), &loci))
            .transpose()?;

        let mut run = Run {
            network,
            process,
            loci,
            rule_loci,
            rng,
            clock: 0.0,
            num_events: 0,
            num_steps: 0,
            schedule: Schedule::default(),
            counts,
            monitor,
            events: config.record_events.then(Vec::new),
        };
        for event in config.posted_events.iter() {
            run.post(event.clone())?;
        }
        Ok(run)
    }

    fn post(&mut self, event: PostedEvent) -> Result<(), EpiError> {
        event.validate(self.clock, &self.network, self.process.compartments())?;
        log::debug!("Event {} posted at t = {}", event.name, event.time);
        self.schedule.post(event);
        Ok(())
    }

    /// Returns the propensity of every rule, in rule order.
    pub(crate) fn propensities(&self) -> Vec<f64> {
        self.process
            .rules()
            .iter()
            .zip(self.rule_loci.iter())
            .map(|(rule, &id)| rule.propensity(self.loci.size(id)))
            .collect()
    }

    /// Move the clock forward to `t`, observing the state before it changes.
    pub(crate) fn advance_to(&mut self, t: f64) {
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.observe_before(t, &self.counts, &self.loci);
        }
        self.clock = t;
    }

    /// Apply a resolved event at the current time, keeping loci and counts in sync.
    ///
    /// An infection whose target already left the susceptible side of its locus, e.g., because
    /// it was infected along another edge in the same tick, is not applicable: nothing changes
    /// and `false` is returned.
    pub(crate) fn apply(
        &mut self,
        rule: usize,
        element: Element,
        transition: Transition,
    ) -> Result<bool, EpiError> {
        let process = &self.process;
        let event = &process.rules()[rule];
        if let (Some(_), Predicate::Edges(left, _)) = (transition.edge, event.predicate()) {
            if self.network.compartment(transition.node)? != Some(left) {
                log::trace!(
                    "t = {:.6}: {} at {} is no longer applicable",
                    self.clock,
                    event.name(),
                    element
                );
                return Ok(false);
            }
        }

        let name = event.name().to_string();
        self.change(name, element, transition.node, transition.to)?;
        if let Some(edge) = transition.edge {
            self.network.mark_occupied(edge, self.clock)?;
        }
        Ok(true)
    }

    /// Fire a posted event at the current time, posting its next occurrence if it repeats.
    /// Returns `false` if the node already is in the target compartment.
    pub(crate) fn fire(&mut self, event: PostedEvent) -> Result<bool, EpiError> {
        if let Some(next) = event.next() {
            self.schedule.post(next);
        }
        if self.network.compartment(event.node)? == Some(event.to) {
            return Ok(false);
        }
        self.change(event.name, Element::Node(event.node), event.node, event.to)?;
        Ok(true)
    }

    fn change(
        &mut self,
        name: String,
        element: Element,
        node: NodeId,
        to: Compartment,
    ) -> Result<(), EpiError> {
        let old = self
            .loci
            .relabel(&mut self.network, node, to)?
            .ok_or_else(|| {
                EpiError::InvariantViolation(format!("node {} has no compartment", node))
            })?;
        self.counts[old.index()] -= 1;
        self.counts[to.index()] += 1;
        self.num_events += 1;

        log::trace!(
            "t = {:.6}: {} at {}, node {} {} -> {}",
            self.clock,
            name,
            element,
            node,
            old,
            to
        );
        if let Some(events) = self.events.as_mut() {
            events.push(EventRecord {
                time: self.clock,
                event: name,
                element,
            });
        }
        Ok(())
    }

    fn count(&self, compartment: Compartment) -> usize {
        self.counts[compartment.index()]
    }

    fn result(&mut self, termination: Termination) -> RunResult {
        let timeseries = self.monitor.take().map(|mut monitor| {
            monitor.observe_through(self.clock, &self.counts, &self.loci);
            monitor.into_series()
        });
        RunResult {
            process: self.process.name().to_string(),
            compartments: self
                .process
                .compartments()
                .iter()
                .map(|&c| (c, self.count(c)))
                .collect::<BTreeMap<Compartment, usize>>(),
            elapsed_time: self.clock,
            num_events: self.num_events,
            num_steps: self.num_steps,
            termination,
            timeseries,
            events: self.events.take(),
        }
    }
}

/// The lifecycle state of a [`Dynamics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No network or process is bound.
    Uninitialized,
    /// The process can be advanced.
    Running,
    /// The run ended normally and its result is available.
    Terminated,
    /// The run was aborted by an error.
    Aborted,
}

#[derive(Debug)]
enum Phase<R> {
    Uninitialized,
    Running(Box<Run<R>>),
    Terminated(Box<Run<R>>, RunResult),
    Aborted(Box<Run<R>>),
}

/// The dynamics of a process over a network.
#[derive(Debug)]
pub struct Dynamics<R> {
    scheduler: Scheduler,
    config: SimulationConfig,
    phase: Phase<R>,
}

impl<R: Rng> Dynamics<R> {
    /// Create uninitialized dynamics with the given scheduler and configuration.
    pub fn new(scheduler: Scheduler, config: SimulationConfig) -> Self {
        Dynamics {
            scheduler,
            config,
            phase: Phase::Uninitialized,
        }
    }

    /// Returns the scheduler.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> State {
        match self.phase {
            Phase::Uninitialized => State::Uninitialized,
            Phase::Running(_) => State::Running,
            Phase::Terminated(_, _) => State::Terminated,
            Phase::Aborted(_) => State::Aborted,
        }
    }

    /// Check that a process can be set up on a network with the current configuration.
    ///
    /// This runs every check [`Dynamics::set_up`] performs before it takes the network over,
    /// so a caller can find out about a configuration error and keep its network. The function
    /// returns an error if the configuration is invalid, if a synchronous probability exceeds 1,
    /// if a compartment watched for extinction is undeclared, if the seeding does not fit the
    /// network, or if a posted event is invalid.
    pub fn validate(&self, network: &Network, process: &Process) -> Result<(), EpiError> {
        self.config.validate()?;

        if self.scheduler == Scheduler::Synchronous {
            if let Some(rule) = process.rules().iter().find(|rule| rule.rate() > 1.0) {
                return Err(EpiError::InvalidParameter(format!(
                    "event {} has probability {}: must be at most 1 for synchronous dynamics",
                    rule.name(),
                    rule.rate()
                )));
            }
        }
        for &c in self.config.stop_when_empty.iter() {
            if !process.compartments().contains(&c) {
                return Err(EpiError::UndeclaredCompartment(format!(
                    "{} is watched for extinction but not declared by process {}",
                    c,
                    process.name()
                )));
            }
        }
        process.check_fits(network)?;
        for event in self.config.posted_events.iter() {
            event.validate(0.0, network, process.compartments())?;
        }
        Ok(())
    }

    /// Bind a process to a network and get ready to run.
    ///
    /// The network's compartments are reset, the process seeds it and registers its loci, and
    /// the clock starts at zero. The function returns an error if the dynamics are already bound
    /// or if [`Dynamics::validate`] fails; no event is processed in that case.
    pub fn set_up(&mut self, network: Network, process: Process, rng: R) -> Result<(), EpiError> {
        if !matches!(self.phase, Phase::Uninitialized) {
            return Err(EpiError::InvalidOperation(
                "the dynamics are already set up, tear them down first".to_string(),
            ));
        }
        self.validate(&network, &process)?;

        let run = Run::build(network, process, rng, &self.config)?;
        if self.config.validate_loci {
            run.loci.check(&run.network)?;
        }

        log::info!(
            "Dynamics set up ({:?}): process {} on {} nodes",
            self.scheduler,
            run.process.name(),
            run.network.num_nodes()
        );
        self.phase = Phase::Running(Box::new(run));
        Ok(())
    }

    fn stop_reason(&self, run: &Run<R>) -> Option<Termination> {
        if run.clock >= self.config.max_time {
            return Some(Termination::MaxTime);
        }
        if let Some(max_events) = self.config.max_events {
            if run.num_events >= max_events {
                return Some(Termination::MaxEvents);
            }
        }
        if !self.config.stop_when_empty.is_empty()
            && self.config.stop_when_empty.iter().all(|&c| run.count(c) == 0)
        {
            return Some(Termination::Extinct);
        }
        None
    }

    /// Advance the process by one step: one tick (synchronous) or one event (stochastic).
    ///
    /// Returns `Some(termination)` once the run has ended, `None` while it can go on. Calling it
    /// again on terminated dynamics returns the same termination. The function returns an error
    /// if the dynamics were never set up or if an internal invariant breaks, which aborts the run.
    pub fn step(&mut self) -> Result<Option<Termination>, EpiError> {
        let mut run = match mem::replace(&mut self.phase, Phase::Uninitialized) {
            Phase::Running(run) => run,
            Phase::Terminated(run, result) => {
                let termination = result.termination;
                self.phase = Phase::Terminated(run, result);
                return Ok(Some(termination));
            }
            Phase::Aborted(run) => {
                self.phase = Phase::Aborted(run);
                return Err(EpiError::InvalidOperation(
                    "the run was aborted".to_string(),
                ));
            }
            Phase::Uninitialized => {
                return Err(EpiError::InvalidOperation(
                    "the dynamics are not set up".to_string(),
                ));
            }
        };

        match self.advance(&mut run) {
            Ok(Some(termination)) => {
                let result = run.result(termination);
                log::info!(
                    "Run terminated ({:?}) at t = {} after {} events: {:?}",
                    termination,
                    result.elapsed_time,
                    result.num_events,
                    result.compartments
                );
                self.phase = Phase::Terminated(run, result);
                Ok(Some(termination))
            }
            Ok(None) => {
                self.phase = Phase::Running(run);
                Ok(None)
            }
            Err(e) => {
                log::error!("Run aborted at t = {}: {}", run.clock, e);
                self.phase = Phase::Aborted(run);
                Err(e)
            }
        }
    }

    fn advance(&self, run: &mut Run<R>) -> Result<Option<Termination>, EpiError> {
        if let Some(termination) = self.stop_reason(run) {
            return Ok(Some(termination));
        }

        let step = match self.scheduler {
            Scheduler::Synchronous => synchronous::step(run)?,
            Scheduler::Stochastic => stochastic::step(run, self.config.max_time)?,
        };
        if self.config.validate_loci {
            run.loci.check(&run.network)?;
        }

        match step {
            Step::Advanced => {
                run.num_steps += 1;
                Ok(self.stop_reason(run))
            }
            Step::Exhausted => Ok(Some(Termination::Exhausted)),
            Step::Bounded => Ok(Some(Termination::MaxTime)),
        }
    }

    /// Post an event to happen at a fixed time of the running process.
    ///
    /// The function returns an error if the dynamics are not running or if the event is invalid,
    /// e.g., posted in the past.
    pub fn post_event(&mut self, event: PostedEvent) -> Result<(), EpiError> {
        match &mut self.phase {
            Phase::Running(run) => run.post(event),
            _ => Err(EpiError::InvalidOperation(
                "events can only be posted to running dynamics".to_string(),
            )),
        }
    }

    /// Run the process until it terminates and return its result.
    pub fn run(&mut self) -> Result<RunResult, EpiError> {
        loop {
            if self.step()?.is_some() {
                break;
            }
        }
        self.result().cloned().ok_or_else(|| {
            EpiError::InvalidOperation("the run ended without a result".to_string())
        })
    }

    /// Returns the result of the run, once terminated.
    pub fn result(&self) -> Option<&RunResult> {
        match &self.phase {
            Phase::Terminated(_, result) => Some(result),
            _ => None,
        }
    }

    fn bound_run(&self) -> Option<&Run<R>> {
        match &self.phase {
            Phase::Uninitialized => None,
            Phase::Running(run) | Phase::Terminated(run, _) | Phase::Aborted(run) => Some(run),
        }
    }

    /// Returns the current simulation time (zero if not set up).
    pub fn time(&self) -> f64 {
        self.bound_run().map_or(0.0, |run| run.clock)
    }

    /// Returns the number of events applied so far.
    pub fn num_events(&self) -> u64 {
        self.bound_run().map_or(0, |run| run.num_events)
    }

    /// Returns the current number of nodes in a compartment.
    pub fn count(&self, compartment: Compartment) -> usize {
        self.bound_run().map_or(0, |run| run.count(compartment))
    }

    /// Returns the bound network.
    pub fn network(&self) -> Option<&Network> {
        self.bound_run().map(|run| &run.network)
    }

    /// Returns the loci of the bound process.
    pub fn loci(&self) -> Option<&Loci> {
        self.bound_run().map(|run| &run.loci)
    }

    /// Returns the bound process.
    pub fn process(&self) -> Option<&Process> {
        self.bound_run().map(|run| &run.process)
    }

    /// Release the network, the process and the generator, returning the network as left by the
    /// run. The dynamics can then be set up again for an independent run.
    pub fn tear_down(&mut self) -> Option<Network> {
        match mem::replace(&mut self.phase, Phase::Uninitialized) {
            Phase::Uninitialized => {
                log::warn!("Tearing down dynamics that were never set up");
                None
            }
            Phase::Running(run) | Phase::Terminated(run, _) | Phase::Aborted(run) => {
                Some(run.network)
            }
        }
    }
}
