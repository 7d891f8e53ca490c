//! Events posted to happen at a fixed simulation time, independently of any rate.
//!
//! A posted event moves one node to a compartment when the clock reaches its time. A repeating
//! event is posted again `interval` units after it fires. Events due at the same time fire in the
//! order they were posted.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::compartment::Compartment;
use crate::core::network::{Network, NodeId};
use crate::error::EpiError;

/// A compartment change posted at a fixed simulation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedEvent {
    /// The name recorded in the event timeline.
    pub name: String,
    /// The simulation time at which the event fires.
    pub time: f64,
    /// The node the event moves.
    pub node: NodeId,
    /// The compartment the node moves to.
    pub to: Compartment,
    /// Post the event again this long after it fires, if any.
    #[serde(default)]
    pub interval: Option<f64>,
}

impl PostedEvent {
    /// An event firing once at `time`.
    pub fn once(name: &str, time: f64, node: NodeId, to: Compartment) -> Self {
        PostedEvent {
            name: name.to_string(),
            time,
            node,
            to,
            interval: None,
        }
    }

    /// An event firing at `time`, then every `interval` units of time.
    pub fn repeating(name: &str, time: f64, interval: f64, node: NodeId, to: Compartment) -> Self {
        PostedEvent {
            name: name.to_string(),
            time,
            node,
            to,
            interval: Some(interval),
        }
    }

    /// Check that the event can be posted on the network at simulation time `clock`.
    ///
    /// The function returns an error if the event is in the past, if its interval is not
    /// positive, if the node is not in the network or if the compartment is not declared.
    pub fn validate(
        &self,
        clock: f64,
        network: &Network,
        compartments: &[Compartment],
    ) -> Result<(), EpiError> {
        if !(self.time.is_finite() && self.time >= clock) {
            return Err(EpiError::InvalidParameter(format!(
                "event {} posted at t = {} but the clock is at {}",
                self.name, self.time, clock
            )));
        }
        if let Some(dt) = self.interval {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(EpiError::InvalidParameter(format!(
                    "event {} repeats every {}: must be positive and finite",
                    self.name, dt
                )));
            }
        }
        if self.node >= network.num_nodes() {
            return Err(EpiError::OutOfBounds(format!(
                "event {} at node {} in a network of {} nodes",
                self.name,
                self.node,
                network.num_nodes()
            )));
        }
        if !compartments.contains(&self.to) {
            return Err(EpiError::UndeclaredCompartment(format!(
                "{} is referenced by posted event {}",
                self.to, self.name
            )));
        }
        Ok(())
    }

    /// Returns the next occurrence of a repeating event.
    pub(crate) fn next(&self) -> Option<PostedEvent> {
        self.interval.map(|dt| PostedEvent {
            time: self.time + dt,
            ..self.clone()
        })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    event: PostedEvent,
}

// BinaryHeap is a max-heap: the earliest time (then the earliest post) compares greatest.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// The pending posted events of a run, earliest first.
#[derive(Debug, Clone, Default)]
pub(crate) struct Schedule {
    heap: BinaryHeap<Entry>,
    num_posted: u64,
}

impl Schedule {
    pub(crate) fn post(&mut self, event: PostedEvent) {
        self.heap.push(Entry {
            seq: self.num_posted,
            event,
        });
        self.num_posted += 1;
    }

    /// Returns the time of the earliest pending event.
    pub(crate) fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.event.time)
    }

    /// Remove and return the earliest pending event if it is due at or before `t`.
    pub(crate) fn pop_due(&mut self, t: f64) -> Option<PostedEvent> {
        match self.next_time() {
            Some(s) if s <= t => self.heap.pop().map(|entry| entry.event),
            _ => None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
