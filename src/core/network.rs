//! The network a process runs over.
//!
//! Nodes and edges are identified by stable integer ids (`0..num_nodes()` and `0..num_edges()`).
//! The topology is fixed once built: the dynamics only relabel nodes with compartments and mark
//! edges that transmitted the disease.
use serde::{Deserialize, Serialize};

use super::compartment::Compartment;
use crate::error::EpiError;

/// Identifier of a node in the network.
pub type NodeId = usize;
/// Identifier of an edge in the network.
pub type EdgeId = usize;

/// A node of the network.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    /// The current compartment of the node, if any.
    compartment: Option<Compartment>,
}

/// An undirected edge of the network.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// The first endpoint.
    source: NodeId,
    /// The second endpoint.
    target: NodeId,
    /// The simulation time at which the disease travelled along the edge, if it did.
    occupied: Option<f64>,
}

/// An undirected network whose nodes carry a compartment.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    // incident edges of each node
    adjacency: Vec<Vec<EdgeId>>,
}

impl Network {
    /// Create a network with the given number of isolated nodes.
    pub fn new(num_nodes: usize) -> Self {
        Network {
            nodes: vec![Node::default(); num_nodes],
            edges: vec![],
            adjacency: vec![vec![]; num_nodes],
        }
    }

    /// Create a network with the given number of nodes and list of edges.
    /// The function returns an error if any edge is invalid (see [`Network::add_edge`]).
    pub fn from_edges(num_nodes: usize, edges: &[(NodeId, NodeId)]) -> Result<Self, EpiError> {
        let mut network = Network::new(num_nodes);
        for &(source, target) in edges {
            network.add_edge(source, target)?;
        }
        Ok(network)
    }

    /// Add an undirected edge between two existing nodes and return its id.
    /// Self-loops are rejected.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, EpiError> {
        if source >= self.num_nodes() || target >= self.num_nodes() {
            return Err(EpiError::OutOfBounds(format!(
                "edge ({}, {}) in a network of {} nodes",
                source,
                target,
                self.num_nodes()
            )));
        }
        if source == target {
            return Err(EpiError::InvalidParameter(format!(
                "self-loop on node {} is not allowed",
                source
            )));
        }

        let id = self.edges.len();
        self.edges.push(Edge {
            source,
            target,
            occupied: None,
        });
        self.adjacency[source].push(id);
        self.adjacency[target].push(id);
        Ok(id)
    }

    /// Returns the number of nodes in the network.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges in the network.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// An iterator over the node ids.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// An iterator over the edge ids.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> {
        0..self.edges.len()
    }

    /// Returns the two endpoints of an edge.
    pub fn endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId), EpiError> {
        self.edges
            .get(edge)
            .map(|e| (e.source, e.target))
            .ok_or_else(|| EpiError::OutOfBounds(format!("edge {}", edge)))
    }

    /// Returns the edges incident to a node.
    pub fn incident_edges(&self, node: NodeId) -> Result<&[EdgeId], EpiError> {
        self.adjacency
            .get(node)
            .map(|edges| &edges[..])
            .ok_or_else(|| EpiError::OutOfBounds(format!("node {}", node)))
    }

    /// An iterator over the neighbours of a node.
    pub fn neighbors(
        &self,
        node: NodeId,
    ) -> Result<impl Iterator<Item = NodeId> + '_, EpiError> {
        let incident = self.incident_edges(node)?;
        Ok(incident.iter().map(move |&e| {
            let edge = &self.edges[e];
            if edge.source == node {
                edge.target
            } else {
                edge.source
            }
        }))
    }

    /// Returns the current compartment of a node (`None` if it was never assigned one).
    pub fn compartment(&self, node: NodeId) -> Result<Option<Compartment>, EpiError> {
        self.nodes
            .get(node)
            .map(|n| n.compartment)
            .ok_or_else(|| EpiError::OutOfBounds(format!("node {}", node)))
    }

    /// Set the compartment of a node and return the previous one.
    ///
    /// This only relabels the node: loci tracking the network must be notified separately,
    /// which is why the dynamics route every change through the loci manager.
    pub fn set_compartment(
        &mut self,
        node: NodeId,
        compartment: Compartment,
    ) -> Result<Option<Compartment>, EpiError> {
        let n = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| EpiError::OutOfBounds(format!("node {}", node)))?;
        Ok(n.compartment.replace(compartment))
    }

    /// Mark an edge as having transmitted the disease at time t.
    pub fn mark_occupied(&mut self, edge: EdgeId, t: f64) -> Result<(), EpiError> {
        let e = self
            .edges
            .get_mut(edge)
            .ok_or_else(|| EpiError::OutOfBounds(format!("edge {}", edge)))?;
        e.occupied = Some(t);
        Ok(())
    }

    /// Returns the time at which the disease travelled along an edge, if it did.
    pub fn occupation_time(&self, edge: EdgeId) -> Result<Option<f64>, EpiError> {
        self.edges
            .get(edge)
            .map(|e| e.occupied)
            .ok_or_else(|| EpiError::OutOfBounds(format!("edge {}", edge)))
    }

    /// Returns the occupied edges, i.e., the contact tree along which the disease spread.
    pub fn contact_tree(&self) -> Vec<EdgeId> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.occupied.is_some())
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns the number of nodes currently in a compartment.
    /// This scans the whole network: the dynamics keep their own running counts.
    pub fn count(&self, compartment: Compartment) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.compartment == Some(compartment))
            .count()
    }

    /// Clear all compartments and edge occupations, keeping the topology.
    pub fn clear_states(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.compartment = None);
        self.edges.iter_mut().for_each(|e| e.occupied = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges() {
        let network = Network::from_edges(4, &[(0, 1), (1, 2), (2, 0)]).unwrap();
        assert_eq!(network.num_nodes(), 4);
        assert_eq!(network.num_edges(), 3);
        assert_eq!(network.incident_edges(0).unwrap(), &[0, 2]);
        assert!(network.incident_edges(3).unwrap().is_empty());

        let mut neighbors: Vec<NodeId> = network.neighbors(1).unwrap().collect();
        neighbors.sort();
        assert_eq!(neighbors, vec![0, 2]);
    }

    #[test]
    fn test_invalid_edges() {
        let mut network = Network::new(2);
        assert!(matches!(
            network.add_edge(0, 2),
            Err(EpiError::OutOfBounds(_))
        ));
        assert!(matches!(
            network.add_edge(1, 1),
            Err(EpiError::InvalidParameter(_))
        ));
        assert_eq!(network.num_edges(), 0);
    }

    #[test]
    fn test_compartments() {
        let mut network = Network::new(3);
        assert_eq!(network.compartment(0), Ok(None));
        assert_eq!(
            network.set_compartment(0, Compartment::Infected),
            Ok(None)
        );
        assert_eq!(
            network.set_compartment(0, Compartment::Removed),
            Ok(Some(Compartment::Infected))
        );
        assert_eq!(network.count(Compartment::Removed), 1);
        assert!(network.compartment(3).is_err());

        network.clear_states();
        assert_eq!(network.compartment(0), Ok(None));
    }

    #[test]
    fn test_contact_tree() {
        let mut network = Network::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        network.mark_occupied(1, 2.5).unwrap();
        assert_eq!(network.contact_tree(), vec![1]);
        assert_eq!(network.occupation_time(1), Ok(Some(2.5)));
        assert_eq!(network.occupation_time(0), Ok(None));

        network.clear_states();
        assert!(network.contact_tree().is_empty());
    }
}
