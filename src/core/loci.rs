//! Loci, i.e., the dynamic sets of network elements where events can currently happen.
//!
//! A locus is defined by a [`Predicate`] over compartments: "all nodes in I", "all edges with an
//! S endpoint and an I endpoint", and so on. The [`Loci`] manager keeps every locus exactly in
//! sync with the network's compartments. Whenever a node changes compartment it must be notified
//! (see [`Loci::notify`]); only the loci whose predicate mentions the old or the new compartment
//! are re-evaluated, and only for the node itself and its incident edges.
//!
//! Each locus is an index set over the node (or edge) arena: a dense vector of members for
//! uniform sampling plus a position table for constant-time removal. Each element additionally
//! carries a bit-set of the loci it currently belongs to.
//!
//! # Example
//!
//! ```rust
//! use rusty_epidemic::core::compartment::Compartment;
//! use rusty_epidemic::core::loci::{Loci, Predicate};
//! use rusty_epidemic::core::network::Network;
//!
//! let mut network = Network::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
//! let mut loci = Loci::new(&network);
//! let si = loci.register(Predicate::Edges(Compartment::Susceptible, Compartment::Infected), "SI", &network).unwrap();
//! let infected = loci.register(Predicate::Nodes(Compartment::Infected), "I", &network).unwrap();
//!
//! for node in 0..3 {
//!     let c = if node == 1 { Compartment::Infected } else { Compartment::Susceptible };
//!     let old = network.set_compartment(node, c).unwrap();
//!     loci.notify(&network, node, old, Some(c)).unwrap();
//! }
//!
//! assert_eq!(loci.size(si), 2);
//! assert_eq!(loci.size(infected), 1);
//! ```
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::compartment::Compartment;
use super::network::{EdgeId, Network, NodeId};
use super::MAX_LOCI;
use crate::error::EpiError;

/// Identifier of a locus within a [`Loci`] manager.
pub type LocusId = usize;

/// The compartment predicate defining the members of a locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// All nodes in the compartment.
    Nodes(Compartment),
    /// All edges with one endpoint in the first compartment and the other in the second.
    Edges(Compartment, Compartment),
}

impl Predicate {
    /// Returns the compartments the predicate depends on.
    pub fn compartments(&self) -> Vec<Compartment> {
        match *self {
            Predicate::Nodes(c) => vec![c],
            Predicate::Edges(l, r) if l == r => vec![l],
            Predicate::Edges(l, r) => vec![l, r],
        }
    }

    /// Returns true if the locus is made of edges.
    pub fn is_edge(&self) -> bool {
        matches!(self, Predicate::Edges(_, _))
    }

    /// Returns the conventional locus name for the predicate, e.g., `I` or `S-I`.
    pub fn default_name(&self) -> String {
        match self {
            Predicate::Nodes(c) => c.name().to_string(),
            Predicate::Edges(l, r) => format!("{}-{}", l, r),
        }
    }

    fn matches_node(&self, c: Option<Compartment>) -> bool {
        match *self {
            Predicate::Nodes(target) => c == Some(target),
            Predicate::Edges(_, _) => false,
        }
    }

    fn matches_edge(&self, a: Option<Compartment>, b: Option<Compartment>) -> bool {
        match (*self, a, b) {
            (Predicate::Edges(l, r), Some(a), Some(b)) => (a == l && b == r) || (a == r && b == l),
            _ => false,
        }
    }

    /// Returns true if the element satisfies the predicate in the current network.
    pub fn matches(&self, network: &Network, element: Element) -> Result<bool, EpiError> {
        match element {
            Element::Node(n) => Ok(self.matches_node(network.compartment(n)?)),
            Element::Edge(e) => {
                let (n, m) = network.endpoints(e)?;
                Ok(self.matches_edge(network.compartment(n)?, network.compartment(m)?))
            }
        }
    }
}

/// A network element a locus can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Node(NodeId),
    Edge(EdgeId),
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Element::Node(n) => write!(f, "node {}", n),
            Element::Edge(e) => write!(f, "edge {}", e),
        }
    }
}

/// A single locus: an index set over the node or edge arena.
#[derive(Debug, Clone)]
struct Locus {
    name: String,
    predicate: Predicate,
    members: Vec<usize>,
    positions: Vec<Option<usize>>,
}

impl Locus {
    fn new(name: &str, predicate: Predicate, num_elements: usize) -> Self {
        Locus {
            name: name.to_string(),
            predicate,
            members: vec![],
            positions: vec![None; num_elements],
        }
    }

    fn element(&self, id: usize) -> Element {
        if self.predicate.is_edge() {
            Element::Edge(id)
        } else {
            Element::Node(id)
        }
    }

    fn insert(&mut self, id: usize) -> Result<(), EpiError> {
        match self.positions[id] {
            Some(_) => Err(EpiError::InvariantViolation(format!(
                "{} is already in locus {}",
                self.element(id),
                self.name
            ))),
            None => {
                self.positions[id] = Some(self.members.len());
                self.members.push(id);
                Ok(())
            }
        }
    }

    fn remove(&mut self, id: usize) -> Result<(), EpiError> {
        let pos = self.positions[id].take().ok_or_else(|| {
            EpiError::InvariantViolation(format!(
                "{} is not in locus {}",
                self.element(id),
                self.name
            ))
        })?;
        self.members.swap_remove(pos);
        if let Some(&moved) = self.members.get(pos) {
            self.positions[moved] = Some(pos);
        }
        Ok(())
    }
}

/// The loci manager.
#[derive(Debug, Clone)]
pub struct Loci {
    loci: Vec<Locus>,
    // bit i set iff the element is in locus i
    node_flags: Vec<u64>,
    edge_flags: Vec<u64>,
    // loci whose predicate mentions a compartment, by compartment index
    node_loci: [Vec<LocusId>; Compartment::COUNT],
    edge_loci: [Vec<LocusId>; Compartment::COUNT],
}

impl Loci {
    /// Create an empty manager for the given network.
    pub fn new(network: &Network) -> Self {
        Loci {
            loci: vec![],
            node_flags: vec![0; network.num_nodes()],
            edge_flags: vec![0; network.num_edges()],
            node_loci: Default::default(),
            edge_loci: Default::default(),
        }
    }

    /// Register a locus under the given name and return its id.
    ///
    /// Registering a name twice with the same predicate returns the existing locus; registering
    /// it with a different predicate is an error. The new locus is filled from the network's
    /// current compartments, so it is empty if no node was assigned a compartment yet.
    pub fn register(
        &mut self,
        predicate: Predicate,
        name: &str,
        network: &Network,
    ) -> Result<LocusId, EpiError> {
        if let Some(id) = self.id(name) {
            if self.loci[id].predicate == predicate {
                return Ok(id);
            }
            return Err(EpiError::InvalidParameter(format!(
                "locus {} is already registered with predicate {:?}",
                name, self.loci[id].predicate
            )));
        }
        if self.node_flags.len() != network.num_nodes()
            || self.edge_flags.len() != network.num_edges()
        {
            return Err(EpiError::InvalidOperation(
                "the loci manager was created for a different network".to_string(),
            ));
        }
        if self.loci.len() >= MAX_LOCI {
            return Err(EpiError::TooManyLoci(self.loci.len() + 1));
        }

        let id = self.loci.len();
        let num_elements = if predicate.is_edge() {
            network.num_edges()
        } else {
            network.num_nodes()
        };
        self.loci.push(Locus::new(name, predicate, num_elements));
        for c in predicate.compartments() {
            match predicate {
                Predicate::Nodes(_) => self.node_loci[c.index()].push(id),
                Predicate::Edges(_, _) => self.edge_loci[c.index()].push(id),
            }
        }

        let bit = 1u64 << id;
        if predicate.is_edge() {
            for e in network.edges() {
                if predicate.matches(network, Element::Edge(e))? {
                    self.loci[id].insert(e)?;
                    self.edge_flags[e] |= bit;
                }
            }
        } else {
            for n in network.nodes() {
                if predicate.matches(network, Element::Node(n))? {
                    self.loci[id].insert(n)?;
                    self.node_flags[n] |= bit;
                }
            }
        }

        log::debug!(
            "Registered locus {} ({:?}) with {} members",
            name,
            predicate,
            self.loci[id].members.len()
        );
        Ok(id)
    }

    /// Update all loci after a node moved from compartment `old` to `new`.
    ///
    /// The network must already hold the new compartment. Only the loci depending on `old` or
    /// `new` are re-evaluated, for the node and its incident edges.
    pub fn notify(
        &mut self,
        network: &Network,
        node: NodeId,
        old: Option<Compartment>,
        new: Option<Compartment>,
    ) -> Result<(), EpiError> {
        if old == new {
            return Ok(());
        }
        if network.compartment(node)? != new {
            return Err(EpiError::InvariantViolation(format!(
                "node {} was notified to be in {:?} but the network says otherwise",
                node, new
            )));
        }

        let changed = [old, new];
        for c in changed.iter().flatten() {
            for i in 0..self.node_loci[c.index()].len() {
                let id = self.node_loci[c.index()][i];
                let satisfied = self.loci[id].predicate.matches_node(new);
                self.update_node(id, node, satisfied)?;
            }
        }

        for c in changed.iter().flatten() {
            if self.edge_loci[c.index()].is_empty() {
                continue;
            }
            for &e in network.incident_edges(node)? {
                let (n, m) = network.endpoints(e)?;
                let (a, b) = (network.compartment(n)?, network.compartment(m)?);
                for i in 0..self.edge_loci[c.index()].len() {
                    let id = self.edge_loci[c.index()][i];
                    let satisfied = self.loci[id].predicate.matches_edge(a, b);
                    self.update_edge(id, e, satisfied)?;
                }
            }
        }
        Ok(())
    }

    /// Move a node to a compartment and update all loci accordingly.
    /// Returns the node's previous compartment.
    pub fn relabel(
        &mut self,
        network: &mut Network,
        node: NodeId,
        compartment: Compartment,
    ) -> Result<Option<Compartment>, EpiError> {
        let old = network.set_compartment(node, compartment)?;
        self.notify(network, node, old, Some(compartment))?;
        Ok(old)
    }

    fn update_node(&mut self, id: LocusId, node: NodeId, satisfied: bool) -> Result<(), EpiError> {
        let bit = 1u64 << id;
        let member = self.node_flags[node] & bit != 0;
        match (member, satisfied) {
            (false, true) => {
                self.loci[id].insert(node)?;
                self.node_flags[node] |= bit;
            }
            (true, false) => {
                self.loci[id].remove(node)?;
                self.node_flags[node] &= !bit;
            }
            _ => {}
        }
        Ok(())
    }

    fn update_edge(&mut self, id: LocusId, edge: EdgeId, satisfied: bool) -> Result<(), EpiError> {
        let bit = 1u64 << id;
        let member = self.edge_flags[edge] & bit != 0;
        match (member, satisfied) {
            (false, true) => {
                self.loci[id].insert(edge)?;
                self.edge_flags[edge] |= bit;
            }
            (true, false) => {
                self.loci[id].remove(edge)?;
                self.edge_flags[edge] &= !bit;
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns the number of registered loci.
    pub fn num_loci(&self) -> usize {
        self.loci.len()
    }

    /// Returns the id of the locus with the given name.
    pub fn id(&self, name: &str) -> Option<LocusId> {
        self.loci.iter().position(|locus| locus.name == name)
    }

    /// Returns the name of a locus.
    pub fn name(&self, id: LocusId) -> &str {
        &self.loci[id].name
    }

    /// Returns the predicate of a locus.
    pub fn predicate(&self, id: LocusId) -> Predicate {
        self.loci[id].predicate
    }

    /// An iterator over the (id, name) pairs of all loci, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (LocusId, &str)> + '_ {
        self.loci
            .iter()
            .enumerate()
            .map(|(id, locus)| (id, locus.name.as_str()))
    }

    /// Returns the number of elements in a locus.
    pub fn size(&self, id: LocusId) -> usize {
        self.loci[id].members.len()
    }

    /// Returns the number of elements in the locus with the given name.
    pub fn size_of(&self, name: &str) -> Result<usize, EpiError> {
        self.id(name)
            .map(|id| self.size(id))
            .ok_or_else(|| EpiError::OutOfBounds(format!("no locus named {}", name)))
    }

    /// Returns true if the locus has no element.
    pub fn is_empty(&self, id: LocusId) -> bool {
        self.loci[id].members.is_empty()
    }

    /// Returns the current members of a locus, in no particular order.
    pub fn members(&self, id: LocusId) -> Vec<Element> {
        let locus = &self.loci[id];
        locus.members.iter().map(|&i| locus.element(i)).collect()
    }

    /// Returns true if the element is currently in the locus.
    pub fn contains(&self, id: LocusId, element: Element) -> bool {
        let locus = &self.loci[id];
        match (element, locus.predicate.is_edge()) {
            (Element::Node(n), false) => locus.positions.get(n).is_some_and(|p| p.is_some()),
            (Element::Edge(e), true) => locus.positions.get(e).is_some_and(|p| p.is_some()),
            _ => false,
        }
    }

    /// Draw an element uniformly at random from a locus, or `None` if the locus is empty.
    pub fn sample<R: Rng + ?Sized>(&self, id: LocusId, rng: &mut R) -> Option<Element> {
        let locus = &self.loci[id];
        if locus.members.is_empty() {
            return None;
        }
        let i = rng.gen_range(0..locus.members.len());
        Some(locus.element(locus.members[i]))
    }

    /// Check every locus against the network by a full scan.
    ///
    /// The tracked size must equal the actual membership, the position tables and element flags
    /// must agree with the member lists, every member must satisfy the predicate and every
    /// element satisfying it must be a member. Every node must also have a compartment.
    pub fn check(&self, network: &Network) -> Result<(), EpiError> {
        for n in network.nodes() {
            if network.compartment(n)?.is_none() {
                return Err(EpiError::InvariantViolation(format!(
                    "node {} has no compartment",
                    n
                )));
            }
        }

        for (id, locus) in self.loci.iter().enumerate() {
            let bit = 1u64 << id;
            let flags = if locus.predicate.is_edge() {
                &self.edge_flags
            } else {
                &self.node_flags
            };

            let tracked = locus.positions.iter().filter(|p| p.is_some()).count();
            if tracked != locus.members.len() {
                return Err(EpiError::InvariantViolation(format!(
                    "locus {} tracks {} positions but has {} members",
                    locus.name,
                    tracked,
                    locus.members.len()
                )));
            }

            for (pos, &i) in locus.members.iter().enumerate() {
                if locus.positions[i] != Some(pos) {
                    return Err(EpiError::InvariantViolation(format!(
                        "locus {} has a stale position for {}",
                        locus.name,
                        locus.element(i)
                    )));
                }
            }

            for (i, &flag) in flags.iter().enumerate() {
                let element = locus.element(i);
                let satisfied = locus.predicate.matches(network, element)?;
                let member = locus.positions[i].is_some();
                if satisfied != member || member != (flag & bit != 0) {
                    return Err(EpiError::InvariantViolation(format!(
                        "locus {} is out of sync for {} (satisfied: {}, member: {})",
                        locus.name, element, satisfied, member
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use Compartment::{Infected, Removed, Susceptible};

    fn set(
        network: &mut Network,
        loci: &mut Loci,
        node: NodeId,
        c: Compartment,
    ) -> Result<(), EpiError> {
        loci.relabel(network, node, c).map(|_| ())
    }

    fn path(num_nodes: usize) -> Network {
        let edges: Vec<(NodeId, NodeId)> = (1..num_nodes).map(|n| (n - 1, n)).collect();
        Network::from_edges(num_nodes, &edges).unwrap()
    }

    #[test]
    fn test_register_dedup() {
        let network = path(3);
        let mut loci = Loci::new(&network);
        let id = loci.register(Predicate::Nodes(Infected), "I", &network).unwrap();
        assert_eq!(
            loci.register(Predicate::Nodes(Infected), "I", &network),
            Ok(id)
        );
        assert!(matches!(
            loci.register(Predicate::Nodes(Removed), "I", &network),
            Err(EpiError::InvalidParameter(_))
        ));
        assert_eq!(loci.num_loci(), 1);
        assert_eq!(loci.size(id), 0);
    }

    #[test]
    fn test_too_many_loci() {
        let network = path(2);
        let mut loci = Loci::new(&network);
        for i in 0..MAX_LOCI {
            loci.register(Predicate::Nodes(Infected), &format!("I{}", i), &network)
                .unwrap();
        }
        assert_eq!(
            loci.register(Predicate::Nodes(Infected), "one too many", &network),
            Err(EpiError::TooManyLoci(MAX_LOCI + 1))
        );
    }

    #[test]
    fn test_register_fills_from_network() {
        let mut network = path(3);
        network.set_compartment(0, Infected).unwrap();
        network.set_compartment(1, Susceptible).unwrap();
        network.set_compartment(2, Infected).unwrap();

        let mut loci = Loci::new(&network);
        let si = loci
            .register(Predicate::Edges(Susceptible, Infected), "S-I", &network)
            .unwrap();
        let i = loci.register(Predicate::Nodes(Infected), "I", &network).unwrap();
        assert_eq!(loci.size(si), 2);
        assert_eq!(loci.size(i), 2);
        loci.check(&network).unwrap();
    }

    #[test]
    fn test_notify_edges_both_orientations() {
        let mut network = path(3);
        let mut loci = Loci::new(&network);
        let si = loci
            .register(Predicate::Edges(Susceptible, Infected), "S-I", &network)
            .unwrap();

        set(&mut network, &mut loci, 0, Susceptible).unwrap();
        set(&mut network, &mut loci, 1, Infected).unwrap();
        set(&mut network, &mut loci, 2, Susceptible).unwrap();
        assert!(loci.contains(si, Element::Edge(0)));
        assert!(loci.contains(si, Element::Edge(1)));
        loci.check(&network).unwrap();

        // infect node 0: edge 0 becomes I-I, edge 1 stays S-I
        set(&mut network, &mut loci, 0, Infected).unwrap();
        assert!(!loci.contains(si, Element::Edge(0)));
        assert!(loci.contains(si, Element::Edge(1)));
        assert_eq!(loci.size(si), 1);
        loci.check(&network).unwrap();

        // removing node 1 leaves no S-I edge at all
        set(&mut network, &mut loci, 1, Removed).unwrap();
        assert!(loci.is_empty(si));
        loci.check(&network).unwrap();
    }

    #[test]
    fn test_notify_same_compartment_edges() {
        let mut network = path(3);
        let mut loci = Loci::new(&network);
        let ii = loci
            .register(Predicate::Edges(Infected, Infected), "I-I", &network)
            .unwrap();

        for n in 0..3 {
            set(&mut network, &mut loci, n, Infected).unwrap();
        }
        assert_eq!(loci.size(ii), 2);

        set(&mut network, &mut loci, 1, Removed).unwrap();
        assert!(loci.is_empty(ii));
        loci.check(&network).unwrap();
    }

    #[test]
    fn test_notify_rejects_stale_network() {
        let mut network = path(2);
        let mut loci = Loci::new(&network);
        loci.register(Predicate::Nodes(Infected), "I", &network).unwrap();
        network.set_compartment(0, Susceptible).unwrap();
        assert!(matches!(
            loci.notify(&network, 0, None, Some(Infected)),
            Err(EpiError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_check_detects_missing_notification() {
        let mut network = path(2);
        let mut loci = Loci::new(&network);
        loci.register(Predicate::Nodes(Infected), "I", &network).unwrap();
        set(&mut network, &mut loci, 0, Susceptible).unwrap();
        set(&mut network, &mut loci, 1, Susceptible).unwrap();
        loci.check(&network).unwrap();

        // relabel without telling the manager
        network.set_compartment(1, Infected).unwrap();
        assert!(matches!(
            loci.check(&network),
            Err(EpiError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_check_detects_missing_compartment() {
        let network = path(2);
        let loci = Loci::new(&network);
        assert!(matches!(
            loci.check(&network),
            Err(EpiError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_sample_is_member() {
        let mut network = path(10);
        let mut loci = Loci::new(&network);
        let i = loci.register(Predicate::Nodes(Infected), "I", &network).unwrap();
        for n in 0..10 {
            let c = if n % 3 == 0 { Infected } else { Susceptible };
            set(&mut network, &mut loci, n, c).unwrap();
        }

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let element = loci.sample(i, &mut rng).unwrap();
            assert!(loci.contains(i, element));
            assert!(matches!(element, Element::Node(n) if n % 3 == 0));
        }

        let empty = loci.register(Predicate::Nodes(Removed), "R", &network).unwrap();
        assert_eq!(loci.sample(empty, &mut rng), None);
    }

    #[test]
    fn test_swap_remove_keeps_positions() {
        let mut network = path(5);
        let mut loci = Loci::new(&network);
        let i = loci.register(Predicate::Nodes(Infected), "I", &network).unwrap();
        for n in 0..5 {
            set(&mut network, &mut loci, n, Infected).unwrap();
        }
        for n in [0, 3, 4, 1] {
            set(&mut network, &mut loci, n, Removed).unwrap();
            loci.check(&network).unwrap();
        }
        assert_eq!(loci.members(i), vec![Element::Node(2)]);
    }
}
