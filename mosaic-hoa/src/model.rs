//! The higher-order automaton (HOA) model.
//!
//! An HOA is a directed graph whose nodes wrap previously learned
//! automata (base FSMs or other HOAs) and whose edges record how one
//! constituent activation positions the next: the move type locates the
//! successor's start coordinate relative to the predecessor's activation,
//! and link constraints tie activation geometry together after the fact.

use mosaic_core::grid::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::store::{AutomatonRef, AutomatonStore};

// ============================================================================
// Moves and Constraints
// ============================================================================

/// How a successor automaton's start coordinate is derived from its
/// predecessor's activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveType {
    /// Successor starts exactly where the predecessor started.
    Start,
    /// Successor starts one move away from the predecessor's start.
    StartOffset(Direction),
    /// Successor starts one move away from the predecessor's end.
    EndOffset(Direction),
    /// Successor starts one move away from some interior coordinate of
    /// the predecessor's activation; resolved by scanning at runtime.
    Incident(Direction),
    /// No positional relation; the successor's start is found by scanning
    /// the predecessor's interior coordinates directly.
    None,
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveType::Start => f.write_str("START"),
            MoveType::StartOffset(d) => write!(f, "START_{d}"),
            MoveType::EndOffset(d) => f.write_str(d.label()),
            MoveType::Incident(d) => write!(f, "INC_{d}"),
            MoveType::None => f.write_str("NONE"),
        }
    }
}

/// A geometric constraint between two constituent activations, verified
/// after both have fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkConstraint {
    /// Both activations end on the same coordinate.
    End,
    /// The successor's end is one move away from an interior coordinate
    /// of the predecessor's activation.
    Incident(Direction),
}

impl fmt::Display for LinkConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkConstraint::End => f.write_str("END"),
            LinkConstraint::Incident(d) => write!(f, "INC_{d}"),
        }
    }
}

// ============================================================================
// Graph Weights
// ============================================================================

/// One HOA node: a constituent automaton and the activation time it had
/// when the HOA was learned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoaNode {
    /// Position in firing order at learning time; node 0 is the entry.
    pub id: usize,
    pub automaton: AutomatonRef,
    /// Concept the constituent automaton belongs to.
    pub concept: String,
    pub activation_time: usize,
}

/// One HOA edge: the successor-positioning move plus link constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoaEdge {
    pub move_type: MoveType,
    pub constraints: Vec<LinkConstraint>,
}

// ============================================================================
// Higher-Order Automaton
// ============================================================================

/// A higher-order automaton: composition of constituent automata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hoa {
    /// Concept this automaton recognizes.
    pub concept: String,
    pub graph: DiGraph<HoaNode, HoaEdge>,
    /// Node-id pairs whose learning-time activation times were equal.
    pub identical_at: Vec<(usize, usize)>,
    /// Node-id pairs whose learning-time activation times differed by 1.
    pub semi_identical_at: Vec<(usize, usize)>,
    /// Flat (src-id, dst-id, constraint) view of all edge constraints.
    pub link_constraints: Vec<(usize, usize, LinkConstraint)>,
}

impl Hoa {
    pub fn new(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            graph: DiGraph::new(),
            identical_at: Vec::new(),
            semi_identical_at: Vec::new(),
            link_constraints: Vec::new(),
        }
    }

    /// The entry node. Nodes are added in firing order, so node 0 is
    /// always the entry.
    pub fn entry(&self) -> NodeIndex {
        NodeIndex::new(0)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Total number of base FSMs reachable through this automaton,
    /// counting nested HOAs recursively. The primary complexity measure.
    pub fn total_fsms(&self, store: &AutomatonStore) -> usize {
        self.graph
            .node_weights()
            .map(|node| match node.automaton {
                AutomatonRef::Fsm(_) => 1,
                AutomatonRef::Hoa(id) => store.hoa(id).total_fsms(store),
            })
            .sum()
    }

    /// Whether the dependency graph is connected as undirected. A learned
    /// HOA with an unrelated constituent is rejected.
    pub fn is_connected(&self) -> bool {
        let n = self.graph.node_count();
        if n == 0 {
            return false;
        }
        let mut uf = UnionFind::new(n);
        for edge in self.graph.edge_references() {
            uf.union(edge.source().index(), edge.target().index());
        }
        let root = uf.find(0);
        (1..n).all(|i| uf.find(i) == root)
    }

    /// Constituent concept names in BFS order from the entry node.
    pub fn bfs_concepts(&self) -> Vec<String> {
        let mut concepts = Vec::with_capacity(self.graph.node_count());
        self.bfs(|node, edge: Option<&HoaEdge>| {
            if edge.is_none() {
                concepts.push(self.graph[node].concept.clone());
            }
        });
        concepts
    }

    /// Edge move labels in BFS order from the entry node.
    pub fn bfs_moves(&self) -> Vec<String> {
        let mut moves = Vec::with_capacity(self.graph.edge_count());
        self.bfs(|_, edge: Option<&HoaEdge>| {
            if let Some(e) = edge {
                moves.push(e.move_type.to_string());
            }
        });
        moves
    }

    /// Successor edges of a node ordered by successor id.
    pub(crate) fn edges_in_id_order(&self, node: NodeIndex) -> Vec<(NodeIndex, &HoaEdge)> {
        let mut edges: Vec<(NodeIndex, &HoaEdge)> = self
            .graph
            .edges(node)
            .map(|e| (e.target(), e.weight()))
            .collect();
        edges.sort_by_key(|(target, _)| self.graph[*target].id);
        edges
    }

    /// BFS from the entry: `visit(node, edge)` fires once per node with
    /// `None`, then once per outgoing edge in successor-id order.
    fn bfs(&self, mut visit: impl FnMut(NodeIndex, Option<&HoaEdge>)) {
        if self.graph.node_count() == 0 {
            return;
        }
        let mut seen = vec![false; self.graph.node_count()];
        let mut queue = VecDeque::new();
        seen[self.entry().index()] = true;
        queue.push_back(self.entry());
        while let Some(node) = queue.pop_front() {
            visit(node, None);
            for (target, edge) in self.edges_in_id_order(node) {
                visit(node, Some(edge));
                if !seen[target.index()] {
                    seen[target.index()] = true;
                    queue.push_back(target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsmId;

    fn node(id: usize, concept: &str, time: usize) -> HoaNode {
        HoaNode {
            id,
            automaton: AutomatonRef::Fsm(FsmId(id)),
            concept: concept.to_string(),
            activation_time: time,
        }
    }

    #[test]
    fn test_move_type_labels() {
        assert_eq!(MoveType::Start.to_string(), "START");
        assert_eq!(MoveType::StartOffset(Direction::Down).to_string(), "START_D");
        assert_eq!(MoveType::EndOffset(Direction::Right).to_string(), "R");
        assert_eq!(MoveType::Incident(Direction::UpLeft).to_string(), "INC_UL");
        assert_eq!(MoveType::None.to_string(), "NONE");
    }

    #[test]
    fn test_link_constraint_labels() {
        assert_eq!(LinkConstraint::End.to_string(), "END");
        assert_eq!(
            LinkConstraint::Incident(Direction::Left).to_string(),
            "INC_L"
        );
    }

    #[test]
    fn test_bfs_sequences() {
        let mut hoa = Hoa::new("square");
        let a = hoa.graph.add_node(node(0, "h_line", 3));
        let b = hoa.graph.add_node(node(1, "v_line", 2));
        let c = hoa.graph.add_node(node(2, "v_line", 2));
        hoa.graph.add_edge(
            a,
            b,
            HoaEdge {
                move_type: MoveType::StartOffset(Direction::Down),
                constraints: vec![],
            },
        );
        hoa.graph.add_edge(
            a,
            c,
            HoaEdge {
                move_type: MoveType::EndOffset(Direction::Down),
                constraints: vec![],
            },
        );
        assert_eq!(hoa.bfs_concepts(), vec!["h_line", "v_line", "v_line"]);
        assert_eq!(hoa.bfs_moves(), vec!["START_D", "D"]);
        assert!(hoa.is_connected());
    }

    #[test]
    fn test_disconnected_node_detected() {
        let mut hoa = Hoa::new("broken");
        hoa.graph.add_node(node(0, "a", 1));
        hoa.graph.add_node(node(1, "b", 1));
        assert!(!hoa.is_connected());
    }
}
