//! Processes, i.e., compartmented models of disease declared as tables.
//!
//! A process is a set of compartments, a seeding rule placing the initial population, and an
//! ordered list of event rules. Each rule names the locus where it happens, its rate (for the
//! stochastic dynamics) or probability (for the synchronous dynamics), and its effect.
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rusty_epidemic::core::compartment::Compartment;
//! use rusty_epidemic::core::loci::Loci;
//! use rusty_epidemic::core::network::Network;
//! use rusty_epidemic::core::process::{Process, Seeding};
//!
//! let mut network = Network::from_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
//! let process = Process::sir(0.5, 0.1, Seeding::Nodes(vec![0])).unwrap();
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut loci = Loci::new(&network);
//! let rule_loci = process.initialize(&mut network, &mut loci, &mut rng).unwrap();
//!
//! assert_eq!(rule_loci.len(), 2);
//! assert_eq!(network.count(Compartment::Infected), 1);
//! assert_eq!(loci.size_of("S-I").unwrap(), 1);
//! ```
use itertools::Itertools;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::compartment::Compartment;
use super::loci::{Element, Loci, LocusId, Predicate};
use super::network::{EdgeId, Network, NodeId};
use crate::error::EpiError;

use Compartment::{Exposed, Infected, Removed, Susceptible};

/// How the initial population is seeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seeding {
    /// Exactly this many nodes, chosen uniformly at random, are seeded.
    Count(usize),
    /// Every node is independently seeded with this probability.
    Fraction(f64),
    /// These specific nodes are seeded.
    Nodes(Vec<NodeId>),
}

/// How the rate of an event scales with the size of its locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// Every element of the locus carries the rate: the propensity is rate times locus size.
    PerElement,
    /// The event happens at the rate as long as the locus is not empty.
    Fixed,
}

/// The effect of an event on the element it happens at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Move the node to the compartment. Only valid for node loci.
    Transition(Compartment),
    /// Move the edge endpoint lying in the locus' first compartment to the compartment, and mark
    /// the edge as occupied. Only valid for edge loci.
    Infect(Compartment),
}

/// A compartment change resolved from an effect, ready to be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// The node changing compartment.
    pub node: NodeId,
    /// The new compartment of the node.
    pub to: Compartment,
    /// The edge the disease travelled along, if any.
    pub edge: Option<EdgeId>,
}

/// An event rule: where an event happens, how often, and what it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRule {
    name: String,
    predicate: Predicate,
    rate: f64,
    kind: RateKind,
    effect: Effect,
}

impl EventRule {
    /// Create an event happening independently at every element of the locus.
    pub fn per_element(name: &str, predicate: Predicate, rate: f64, effect: Effect) -> Self {
        EventRule {
            name: name.to_string(),
            predicate,
            rate,
            kind: RateKind::PerElement,
            effect,
        }
    }

    /// Create an event happening at a fixed rate, at one element of the locus, whenever the locus is not empty.
    pub fn fixed_rate(name: &str, predicate: Predicate, rate: f64, effect: Effect) -> Self {
        EventRule {
            name: name.to_string(),
            predicate,
            rate,
            kind: RateKind::Fixed,
            effect,
        }
    }

    /// Returns the name of the event.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the predicate of the event's locus.
    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    /// Returns the name of the event's locus.
    pub fn locus_name(&self) -> String {
        self.predicate.default_name()
    }

    /// Returns the rate (stochastic dynamics) or probability (synchronous dynamics) of the event.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Returns how the event rate scales with its locus.
    pub fn kind(&self) -> RateKind {
        self.kind
    }

    /// Returns the effect of the event.
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Returns the propensity of the event given the current size of its locus.
    pub fn propensity(&self, locus_size: usize) -> f64 {
        match self.kind {
            RateKind::PerElement => self.rate * locus_size as f64,
            RateKind::Fixed if locus_size > 0 => self.rate,
            RateKind::Fixed => 0.0,
        }
    }

    /// Resolve the effect of the event at an element into a compartment change.
    /// The element must currently be in the event's locus.
    pub fn resolve(&self, network: &Network, element: Element) -> Result<Transition, EpiError> {
        if !self.predicate.matches(network, element)? {
            return Err(EpiError::InvariantViolation(format!(
                "{} is not eligible for event {}",
                element, self.name
            )));
        }
        match (self.effect, element) {
            (Effect::Transition(to), Element::Node(node)) => Ok(Transition {
                node,
                to,
                edge: None,
            }),
            (Effect::Infect(to), Element::Edge(edge)) => {
                let left = match self.predicate {
                    Predicate::Edges(left, _) => left,
                    Predicate::Nodes(_) => {
                        return Err(EpiError::InvariantViolation(format!(
                            "event {} infects along an edge but tracks nodes",
                            self.name
                        )))
                    }
                };
                let (n, m) = network.endpoints(edge)?;
                let node = if network.compartment(n)? == Some(left) {
                    n
                } else if network.compartment(m)? == Some(left) {
                    m
                } else {
                    return Err(EpiError::InvariantViolation(format!(
                        "edge {} has no endpoint in {} for event {}",
                        edge, left, self.name
                    )));
                };
                Ok(Transition {
                    node,
                    to,
                    edge: Some(edge),
                })
            }
            (_, element) => Err(EpiError::InvariantViolation(format!(
                "event {} cannot happen at {}",
                self.name, element
            ))),
        }
    }

    fn validate(&self, compartments: &[Compartment]) -> Result<(), EpiError> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(EpiError::InvalidParameter(format!(
                "event {} has rate {}: must be finite and non-negative",
                self.name, self.rate
            )));
        }

        let target = match self.effect {
            Effect::Transition(c) | Effect::Infect(c) => c,
        };
        if let Some(c) = self
            .predicate
            .compartments()
            .into_iter()
            .chain(std::iter::once(target))
            .find(|c| !compartments.contains(c))
        {
            return Err(EpiError::UndeclaredCompartment(format!(
                "{} is referenced by event {}",
                c, self.name
            )));
        }

        match (self.predicate, self.effect) {
            (Predicate::Nodes(_), Effect::Transition(_)) => Ok(()),
            (Predicate::Edges(_, _), Effect::Infect(_)) => Ok(()),
            _ => Err(EpiError::InvalidParameter(format!(
                "event {} has an effect incompatible with its locus",
                self.name
            ))),
        }
    }
}

/// A compartmented process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    name: String,
    compartments: Vec<Compartment>,
    seed_compartment: Compartment,
    default_compartment: Compartment,
    seeding: Seeding,
    rules: Vec<EventRule>,
}

impl Process {
    /// Create a process from its tables.
    ///
    /// Seeded nodes are placed in `seed_compartment`, all the others in `default_compartment`.
    /// The function returns an error if a compartment is declared twice, if any compartment
    /// used by the seeding or the rules is undeclared, or if a rule or the seeding is invalid.
    pub fn build(
        name: &str,
        compartments: Vec<Compartment>,
        seed_compartment: Compartment,
        default_compartment: Compartment,
        seeding: Seeding,
        rules: Vec<EventRule>,
    ) -> Result<Self, EpiError> {
        if compartments.is_empty() {
            return Err(EpiError::InvalidParameter(format!(
                "process {} declares no compartment",
                name
            )));
        }
        if let Some(c) = compartments.iter().duplicates().next() {
            return Err(EpiError::InvalidParameter(format!(
                "compartment {} is declared twice in process {}",
                c, name
            )));
        }
        for c in [seed_compartment, default_compartment] {
            if !compartments.contains(&c) {
                return Err(EpiError::UndeclaredCompartment(format!(
                    "{} is used for seeding process {}",
                    c, name
                )));
            }
        }

        match &seeding {
            Seeding::Fraction(p) if !(0.0..=1.0).contains(p) => {
                return Err(EpiError::InvalidParameter(format!(
                    "seed fraction {} must be in [0, 1]",
                    p
                )));
            }
            Seeding::Nodes(nodes) => {
                if let Some(n) = nodes.iter().duplicates().next() {
                    return Err(EpiError::InvalidParameter(format!(
                        "node {} is seeded twice",
                        n
                    )));
                }
            }
            _ => {}
        }

        for rule in rules.iter() {
            rule.validate(&compartments)?;
        }
        if let Some(n) = rules.iter().map(|rule| rule.name()).duplicates().next() {
            return Err(EpiError::InvalidParameter(format!(
                "event {} is declared twice in process {}",
                n, name
            )));
        }

        Ok(Process {
            name: name.to_string(),
            compartments,
            seed_compartment,
            default_compartment,
            seeding,
            rules,
        })
    }

    /// The susceptible-infected-removed process.
    ///
    /// Infection happens along S-I edges with rate (probability) `p_infect`, removal happens at
    /// I nodes with rate (probability) `p_remove`. Seeds are infected.
    pub fn sir(p_infect: f64, p_remove: f64, seeding: Seeding) -> Result<Self, EpiError> {
        Process::build(
            "SIR",
            vec![Susceptible, Infected, Removed],
            Infected,
            Susceptible,
            seeding,
            vec![
                EventRule::per_element(
                    "infect",
                    Predicate::Edges(Susceptible, Infected),
                    p_infect,
                    Effect::Infect(Infected),
                ),
                EventRule::per_element(
                    "remove",
                    Predicate::Nodes(Infected),
                    p_remove,
                    Effect::Transition(Removed),
                ),
            ],
        )
    }

    /// The susceptible-infected-susceptible process.
    ///
    /// Infection happens along S-I edges with rate (probability) `p_infect`, recovery back to
    /// susceptible happens at I nodes with rate (probability) `p_recover`. Seeds are infected.
    pub fn sis(p_infect: f64, p_recover: f64, seeding: Seeding) -> Result<Self, EpiError> {
        Process::build(
            "SIS",
            vec![Susceptible, Infected],
            Infected,
            Susceptible,
            seeding,
            vec![
                EventRule::per_element(
                    "infect",
                    Predicate::Edges(Susceptible, Infected),
                    p_infect,
                    Effect::Infect(Infected),
                ),
                EventRule::per_element(
                    "recover",
                    Predicate::Nodes(Infected),
                    p_recover,
                    Effect::Transition(Susceptible),
                ),
            ],
        )
    }

    /// The susceptible-exposed-infected-removed process.
    ///
    /// Both exposed (asymptomatic) and infected (symptomatic) nodes pass the disease on, making
    /// their susceptible neighbours exposed. Exposed nodes become infected, infected nodes are
    /// removed. Seeds are exposed.
    pub fn seir(
        p_infect_asymptomatic: f64,
        p_infect: f64,
        p_symptoms: f64,
        p_remove: f64,
        seeding: Seeding,
    ) -> Result<Self, EpiError> {
        Process::build(
            "SEIR",
            vec![Susceptible, Exposed, Infected, Removed],
            Exposed,
            Susceptible,
            seeding,
            vec![
                EventRule::per_element(
                    "infect_asymptomatic",
                    Predicate::Edges(Susceptible, Exposed),
                    p_infect_asymptomatic,
                    Effect::Infect(Exposed),
                ),
                EventRule::per_element(
                    "infect",
                    Predicate::Edges(Susceptible, Infected),
                    p_infect,
                    Effect::Infect(Exposed),
                ),
                EventRule::per_element(
                    "symptoms",
                    Predicate::Nodes(Exposed),
                    p_symptoms,
                    Effect::Transition(Infected),
                ),
                EventRule::per_element(
                    "remove",
                    Predicate::Nodes(Infected),
                    p_remove,
                    Effect::Transition(Removed),
                ),
            ],
        )
    }

    /// Returns the name of the process.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared compartments.
    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    /// Returns the compartment seeded nodes are placed in.
    pub fn seed_compartment(&self) -> Compartment {
        self.seed_compartment
    }

    /// Returns the seeding rule.
    pub fn seeding(&self) -> &Seeding {
        &self.seeding
    }

    /// Returns the event rules, in declaration order.
    pub fn rules(&self) -> &[EventRule] {
        &self.rules
    }

    /// Check that the seeding fits the network.
    ///
    /// The function returns an error if more nodes are seeded than the network has, or if a
    /// seeded node is not in the network.
    pub fn check_fits(&self, network: &Network) -> Result<(), EpiError> {
        let num_nodes = network.num_nodes();
        match &self.seeding {
            Seeding::Count(k) if *k > num_nodes => Err(EpiError::InvalidParameter(format!(
                "cannot seed {} nodes in a network of {} nodes",
                k, num_nodes
            ))),
            Seeding::Nodes(nodes) if nodes.len() > num_nodes => {
                Err(EpiError::InvalidParameter(format!(
                    "cannot seed {} nodes in a network of {} nodes",
                    nodes.len(),
                    num_nodes
                )))
            }
            Seeding::Nodes(nodes) => match nodes.iter().find(|&&n| n >= num_nodes) {
                Some(n) => Err(EpiError::OutOfBounds(format!(
                    "seed node {} in a network of {} nodes",
                    n, num_nodes
                ))),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Bind the process to a network.
    ///
    /// Any previous compartment or edge occupation is cleared, the locus of every event rule is
    /// registered with the loci manager, and every node is placed in its initial compartment
    /// (keeping the loci in sync). Returns the locus of each rule, in rule order.
    /// The function returns an error if the seeding does not fit the network.
    pub fn initialize<R: Rng + ?Sized>(
        &self,
        network: &mut Network,
        loci: &mut Loci,
        rng: &mut R,
    ) -> Result<Vec<LocusId>, EpiError> {
        self.check_fits(network)?;
        network.clear_states();

        let rule_loci = self
            .rules
            .iter()
            .map(|rule| loci.register(rule.predicate(), &rule.locus_name(), network))
            .collect::<Result<Vec<LocusId>, EpiError>>()?;

        let num_nodes = network.num_nodes();
        let mut seeded = vec![false; num_nodes];
        match &self.seeding {
            Seeding::Count(k) => {
                index::sample(rng, num_nodes, *k)
                    .into_iter()
                    .for_each(|n| seeded[n] = true);
            }
            Seeding::Fraction(p) => {
                seeded.iter_mut().for_each(|s| *s = rng.gen_bool(*p));
            }
            Seeding::Nodes(nodes) => {
                nodes.iter().for_each(|&n| seeded[n] = true);
            }
        }

        for (node, &s) in seeded.iter().enumerate() {
            let c = if s {
                self.seed_compartment
            } else {
                self.default_compartment
            };
            loci.relabel(network, node, c)?;
        }

        log::info!(
            "Process {} initialized on {} nodes and {} edges, {} seeds in {}",
            self.name,
            num_nodes,
            network.num_edges(),
            seeded.iter().filter(|&&s| s).count(),
            self.seed_compartment
        );
        Ok(rule_loci)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    fn star(num_leaves: usize) -> Network {
        let edges: Vec<(NodeId, NodeId)> = (1..=num_leaves).map(|n| (0, n)).collect();
        Network::from_edges(num_leaves + 1, &edges).unwrap()
    }

    #[test]
    fn test_invalid_rates() {
        assert!(matches!(
            Process::sir(-0.1, 0.1, Seeding::Count(1)),
            Err(EpiError::InvalidParameter(_))
        ));
        assert!(matches!(
            Process::sis(0.1, f64::NAN, Seeding::Count(1)),
            Err(EpiError::InvalidParameter(_))
        ));
        assert!(matches!(
            Process::sir(f64::INFINITY, 0.1, Seeding::Count(1)),
            Err(EpiError::InvalidParameter(_))
        ));
        // zero rates are allowed, the event simply never happens
        assert!(Process::sir(1.0, 0.0, Seeding::Count(1)).is_ok());
    }

    #[test]
    fn test_invalid_seeding() {
        assert!(matches!(
            Process::sir(0.1, 0.1, Seeding::Fraction(1.5)),
            Err(EpiError::InvalidParameter(_))
        ));
        assert!(matches!(
            Process::sir(0.1, 0.1, Seeding::Nodes(vec![1, 2, 1])),
            Err(EpiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_undeclared_compartment() {
        let rules = vec![EventRule::per_element(
            "remove",
            Predicate::Nodes(Infected),
            0.1,
            Effect::Transition(Removed),
        )];
        assert!(matches!(
            Process::build(
                "SI",
                vec![Susceptible, Infected],
                Infected,
                Susceptible,
                Seeding::Count(1),
                rules
            ),
            Err(EpiError::UndeclaredCompartment(_))
        ));

        assert!(matches!(
            Process::build(
                "SI",
                vec![Susceptible, Infected],
                Exposed,
                Susceptible,
                Seeding::Count(1),
                vec![]
            ),
            Err(EpiError::UndeclaredCompartment(_))
        ));
    }

    #[test]
    fn test_incompatible_effect() {
        let rules = vec![EventRule::per_element(
            "infect",
            Predicate::Nodes(Infected),
            0.1,
            Effect::Infect(Infected),
        )];
        assert!(matches!(
            Process::build(
                "SI",
                vec![Susceptible, Infected],
                Infected,
                Susceptible,
                Seeding::Count(1),
                rules
            ),
            Err(EpiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_seed_count_exceeds_network() {
        let mut network = star(3);
        let mut loci = Loci::new(&network);
        let mut rng = StdRng::seed_from_u64(SEED);
        let process = Process::sir(0.1, 0.1, Seeding::Count(5)).unwrap();
        assert!(matches!(
            process.initialize(&mut network, &mut loci, &mut rng),
            Err(EpiError::InvalidParameter(_))
        ));

        let process = Process::sir(0.1, 0.1, Seeding::Nodes(vec![7])).unwrap();
        let mut loci = Loci::new(&network);
        assert!(matches!(
            process.initialize(&mut network, &mut loci, &mut rng),
            Err(EpiError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_initialize_count() {
        let mut network = star(9);
        let mut rng = StdRng::seed_from_u64(SEED);
        let process = Process::sir(0.1, 0.1, Seeding::Count(4)).unwrap();

        let mut loci = Loci::new(&network);
        let rule_loci = process
            .initialize(&mut network, &mut loci, &mut rng)
            .unwrap();

        assert_eq!(network.count(Infected), 4);
        assert_eq!(network.count(Susceptible), 6);
        assert_eq!(loci.size(rule_loci[1]), 4);
        loci.check(&network).unwrap();
    }

    #[test]
    fn test_initialize_fraction_extremes() {
        let mut network = star(9);
        let mut rng = StdRng::seed_from_u64(SEED);

        let process = Process::sis(0.1, 0.1, Seeding::Fraction(1.0)).unwrap();
        let mut loci = Loci::new(&network);
        process.initialize(&mut network, &mut loci, &mut rng).unwrap();
        assert_eq!(network.count(Infected), 10);

        let process = Process::sis(0.1, 0.1, Seeding::Fraction(0.0)).unwrap();
        let mut loci = Loci::new(&network);
        process.initialize(&mut network, &mut loci, &mut rng).unwrap();
        assert_eq!(network.count(Infected), 0);
        loci.check(&network).unwrap();
    }

    #[test]
    fn test_seir_seeds_exposed() {
        let mut network = star(4);
        let mut rng = StdRng::seed_from_u64(SEED);
        let process = Process::seir(0.1, 0.2, 0.3, 0.4, Seeding::Nodes(vec![0])).unwrap();
        let mut loci = Loci::new(&network);
        let rule_loci = process
            .initialize(&mut network, &mut loci, &mut rng)
            .unwrap();

        assert_eq!(network.compartment(0), Ok(Some(Exposed)));
        // S-E, S-I, E, I
        assert_eq!(
            rule_loci.iter().map(|&id| loci.size(id)).collect::<Vec<_>>(),
            vec![4, 0, 1, 0]
        );
    }

    #[test]
    fn test_resolve_infect_orientation() {
        let mut network = star(2);
        let mut rng = StdRng::seed_from_u64(SEED);
        let process = Process::sir(0.1, 0.1, Seeding::Nodes(vec![2])).unwrap();
        let mut loci = Loci::new(&network);
        process.initialize(&mut network, &mut loci, &mut rng).unwrap();

        // edge 1 is (0, 2): the hub is susceptible, the leaf is infected
        let transition = process.rules()[0]
            .resolve(&network, Element::Edge(1))
            .unwrap();
        assert_eq!(
            transition,
            Transition {
                node: 0,
                to: Infected,
                edge: Some(1)
            }
        );

        // edge 0 is (0, 1): S-S, not in the locus
        assert!(process.rules()[0]
            .resolve(&network, Element::Edge(0))
            .is_err());
    }

    #[test]
    fn test_propensity() {
        let rule = EventRule::per_element(
            "remove",
            Predicate::Nodes(Infected),
            0.5,
            Effect::Transition(Removed),
        );
        assert_eq!(rule.propensity(0), 0.0);
        assert_eq!(rule.propensity(4), 2.0);

        let rule = EventRule::fixed_rate(
            "remove",
            Predicate::Nodes(Infected),
            0.5,
            Effect::Transition(Removed),
        );
        assert_eq!(rule.propensity(0), 0.0);
        assert_eq!(rule.propensity(4), 0.5);
    }
}
