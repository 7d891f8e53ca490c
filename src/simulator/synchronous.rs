//! Discrete-time synchronous dynamics.
//!
//! Every tick, each rule is tried against a snapshot of its locus taken at the start of the tick:
//! per-element rules perform one Bernoulli trial per member, fixed-rate rules one trial for the
//! whole locus (applied to a uniformly chosen member). Successful trials are resolved against the
//! state at the start of the tick and queued; once all trials are done the clock moves forward by
//! one unit and the queue is applied in rule declaration order, then snapshot order. When two
//! queued events move the same node, the last applicable one wins: an infection whose target was
//! already infected earlier in the queue is dropped. Posted events due by the end of the tick fire
//! after the queue, in time order.
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

use crate::core::loci::Element;
use crate::core::process::{RateKind, Transition};
use crate::error::EpiError;

use super::dynamics::{Run, Step};

/// The duration of a tick.
pub const TICK: f64 = 1.0;

/// Perform one tick.
pub(crate) fn step<R: Rng>(run: &mut Run<R>) -> Result<Step, EpiError> {
    if run.propensities().iter().all(|&a| a <= 0.0) && run.schedule.is_empty() {
        return Ok(Step::Exhausted);
    }

    let mut queue: Vec<(usize, Element, Transition)> = vec![];
    for (i, rule) in run.process.rules().iter().enumerate() {
        let locus = run.rule_loci[i];
        if run.loci.is_empty(locus) || rule.rate() <= 0.0 {
            continue;
        }

        let trial = Bernoulli::new(rule.rate()).map_err(|e| {
            EpiError::InvalidParameter(format!("event {}: {}", rule.name(), e))
        })?;
        match rule.kind() {
            RateKind::PerElement => {
                for element in run.loci.members(locus) {
                    if trial.sample(&mut run.rng) {
                        queue.push((i, element, rule.resolve(&run.network, element)?));
                    }
                }
            }
            RateKind::Fixed => {
                if trial.sample(&mut run.rng) {
                    let element = run.loci.sample(locus, &mut run.rng).ok_or_else(|| {
                        EpiError::InvariantViolation(format!(
                            "locus {} is empty",
                            run.loci.name(locus)
                        ))
                    })?;
                    queue.push((i, element, rule.resolve(&run.network, element)?));
                }
            }
        }
    }

    let end = run.clock + TICK;
    run.advance_to(end);
    let mut applied = 0;
    for (i, element, transition) in queue {
        if run.apply(i, element, transition)? {
            applied += 1;
        }
    }
    while let Some(event) = run.schedule.pop_due(end) {
        if run.fire(event)? {
            applied += 1;
        }
    }
    log::debug!("Tick {} -> {}: {} events", end - TICK, end, applied);
    Ok(Step::Advanced)
}

#[cfg(test)]
mod tests {
    use crate::core::compartment::Compartment;
    use crate::core::loci::Predicate;
    use crate::core::network::Network;
    use crate::core::process::{Effect, EventRule, Process, Seeding};
    use crate::simulator::dynamics::{Dynamics, Scheduler, SimulationConfig};
    use crate::simulator::result::Termination;
    use crate::simulator::schedule::PostedEvent;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use Compartment::{Infected, Removed, Susceptible};

    fn config() -> SimulationConfig {
        SimulationConfig {
            validate_loci: true,
            record_events: true,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_snapshot_prevents_chain_infection() {
        // on a path 0-1-2 seeded at 0, node 2 cannot be infected in the same tick as node 1
        let network = Network::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        let process = Process::sir(1.0, 0.0, Seeding::Nodes(vec![0])).unwrap();
        let mut dynamics = Dynamics::new(Scheduler::Synchronous, config());
        dynamics
            .set_up(network, process, ChaCha8Rng::seed_from_u64(0))
            .unwrap();

        assert_eq!(dynamics.step(), Ok(None));
        assert_eq!(dynamics.count(Infected), 2);
        assert_eq!(dynamics.count(Susceptible), 1);
        assert_eq!(dynamics.time(), 1.0);

        assert_eq!(dynamics.step(), Ok(None));
        assert_eq!(dynamics.count(Infected), 3);
        assert_eq!(dynamics.step(), Ok(Some(Termination::Exhausted)));
        assert_eq!(dynamics.time(), 2.0);
    }

    #[test]
    fn test_last_applicable_effect_wins() {
        // a single infected node is both removed and "cured" back to susceptible in the same
        // tick: the cure is declared last, so it wins
        let network = Network::new(1);
        let process = Process::build(
            "conflict",
            vec![Susceptible, Infected, Removed],
            Infected,
            Susceptible,
            Seeding::Nodes(vec![0]),
            vec![
                EventRule::per_element(
                    "remove",
                    Predicate::Nodes(Infected),
                    1.0,
                    Effect::Transition(Removed),
                ),
                EventRule::per_element(
                    "cure",
                    Predicate::Nodes(Infected),
                    1.0,
                    Effect::Transition(Susceptible),
                ),
            ],
        )
        .unwrap();
        let mut dynamics = Dynamics::new(Scheduler::Synchronous, config());
        dynamics
            .set_up(network, process, ChaCha8Rng::seed_from_u64(0))
            .unwrap();
        let result = dynamics.run().unwrap();

        assert_eq!(result.count(Susceptible), 1);
        assert_eq!(result.count(Removed), 0);
        let events = result.events.as_ref().unwrap();
        assert_eq!(
            events.iter().map(|e| e.event.as_str()).collect::<Vec<_>>(),
            vec!["remove", "cure"]
        );
        assert_eq!(result.termination, Termination::Exhausted);
    }

    #[test]
    fn test_fixed_rate_event_applies_once_per_tick() {
        let network = Network::new(5);
        let process = Process::build(
            "fixed",
            vec![Susceptible, Infected, Removed],
            Infected,
            Susceptible,
            Seeding::Fraction(1.0),
            vec![EventRule::fixed_rate(
                "remove",
                Predicate::Nodes(Infected),
                1.0,
                Effect::Transition(Removed),
            )],
        )
        .unwrap();
        let mut dynamics = Dynamics::new(Scheduler::Synchronous, config());
        dynamics
            .set_up(network, process, ChaCha8Rng::seed_from_u64(7))
            .unwrap();

        for tick in 1..=5 {
            assert_eq!(dynamics.step(), Ok(None));
            assert_eq!(dynamics.count(Removed), tick);
        }
        assert_eq!(dynamics.step(), Ok(Some(Termination::Exhausted)));
        assert_eq!(dynamics.time(), 5.0);
    }

    #[test]
    fn test_infection_along_two_edges_counts_once() {
        // node 1 is between two infected nodes: it is infected once, along a single edge
        let network = Network::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        let process = Process::sir(1.0, 0.0, Seeding::Nodes(vec![0, 2])).unwrap();
        let mut dynamics = Dynamics::new(Scheduler::Synchronous, config());
        dynamics
            .set_up(network, process, ChaCha8Rng::seed_from_u64(0))
            .unwrap();
        let result = dynamics.run().unwrap();

        assert_eq!(result.count(Infected), 3);
        assert_eq!(result.num_events, 1);
        let events = result.events.as_ref().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "infect");
        assert_eq!(events[0].time, 1.0);

        let network = dynamics.tear_down().unwrap();
        assert_eq!(network.contact_tree().len(), 1);
    }

    #[test]
    fn test_repeating_posted_events_fire_at_covering_tick() {
        // no rate-driven event can happen: only the posted events move node 0
        let network = Network::new(2);
        let process = Process::sis(0.0, 0.0, Seeding::Count(0)).unwrap();
        let mut dynamics = Dynamics::new(
            Scheduler::Synchronous,
            SimulationConfig {
                max_time: 4.0,
                posted_events: vec![
                    PostedEvent::repeating("fall ill", 0.5, 2.0, 0, Infected),
                    PostedEvent::repeating("get well", 1.5, 2.0, 0, Susceptible),
                ],
                ..config()
            },
        );
        dynamics
            .set_up(network, process, ChaCha8Rng::seed_from_u64(0))
            .unwrap();

        assert_eq!(dynamics.step(), Ok(None));
        assert_eq!(dynamics.count(Infected), 1);
        assert_eq!(dynamics.step(), Ok(None));
        assert_eq!(dynamics.count(Infected), 0);

        let result = dynamics.run().unwrap();
        assert_eq!(result.termination, Termination::MaxTime);
        assert_eq!(result.num_events, 4);
        let events = result.events.as_ref().unwrap();
        assert_eq!(
            events.iter().map(|e| (e.time, e.event.as_str())).collect::<Vec<_>>(),
            vec![
                (1.0, "fall ill"),
                (2.0, "get well"),
                (3.0, "fall ill"),
                (4.0, "get well")
            ]
        );
        assert_eq!(result.count(Susceptible), 2);
    }

    #[test]
    fn test_posted_event_applies_after_rule_effects() {
        // the removal and the posted recovery both move node 0 during the first tick
        let network = Network::new(1);
        let process = Process::sir(0.0, 1.0, Seeding::Nodes(vec![0])).unwrap();
        let mut dynamics = Dynamics::new(
            Scheduler::Synchronous,
            SimulationConfig {
                posted_events: vec![PostedEvent::once("recover", 0.0, 0, Susceptible)],
                ..config()
            },
        );
        dynamics
            .set_up(network, process, ChaCha8Rng::seed_from_u64(0))
            .unwrap();

        assert_eq!(dynamics.step(), Ok(None));
        assert_eq!(dynamics.count(Susceptible), 1);
        assert_eq!(dynamics.count(Removed), 0);
        assert_eq!(dynamics.num_events(), 2);
        assert_eq!(dynamics.step(), Ok(Some(Termination::Exhausted)));
    }
}
