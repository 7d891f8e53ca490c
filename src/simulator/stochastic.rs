//! Continuous-time stochastic dynamics (Gillespie's direct method).
//!
//! At each step the propensity of every rule is computed from the current size of its locus.
//! The waiting time to the next event is exponentially distributed with the total propensity as
//! rate; the rule is chosen with probability proportional to its propensity, and the element
//! uniformly at random from the rule's locus.
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::error::EpiError;

use super::dynamics::{Run, Step};

/// Draw and apply the next event, unless it would happen after `max_time`.
///
/// A posted event due before the drawn event time fires instead; the drawn event is then
/// discarded, which is exact since waiting times are memoryless.
pub(crate) fn step<R: Rng>(run: &mut Run<R>, max_time: f64) -> Result<Step, EpiError> {
    let propensities = run.propensities();
    let total: f64 = propensities.iter().sum();

    let drawn = if total > 0.0 {
        let dt = Exp::new(total)
            .map_err(|e| {
                EpiError::InvariantViolation(format!("total propensity {}: {}", total, e))
            })?
            .sample(&mut run.rng);
        Some(run.clock + dt)
    } else {
        None
    };
    let posted = run.schedule.next_time();

    let t = match (drawn, posted) {
        (None, None) => return Ok(Step::Exhausted),
        (Some(t), None) | (None, Some(t)) => t,
        (Some(t), Some(s)) => t.min(s),
    };
    if t > max_time {
        log::debug!("Next event at t = {} is past the maximum time {}", t, max_time);
        run.advance_to(max_time);
        return Ok(Step::Bounded);
    }

    if posted == Some(t) {
        run.advance_to(t);
        if let Some(event) = run.schedule.pop_due(t) {
            run.fire(event)?;
        }
        return Ok(Step::Advanced);
    }

    let i = WeightedIndex::new(&propensities)
        .map_err(|e| EpiError::InvariantViolation(format!("propensities {:?}: {}", propensities, e)))?
        .sample(&mut run.rng);
    let locus = run.rule_loci[i];
    let element = run.loci.sample(locus, &mut run.rng).ok_or_else(|| {
        EpiError::InvariantViolation(format!(
            "locus {} is empty but has propensity {}",
            run.loci.name(locus),
            propensities[i]
        ))
    })?;
    let transition = run.process.rules()[i].resolve(&run.network, element)?;

    run.advance_to(t);
    run.apply(i, element, transition)?;
    Ok(Step::Advanced)
}
