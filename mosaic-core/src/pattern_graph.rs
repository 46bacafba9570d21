//! Pattern graphs: the adjacency structure of one pattern matrix.
//!
//! Nodes are the non-blank coordinates of the matrix; two nodes are
//! connected by a directed edge (in both directions) when they are
//! Moore-adjacent, the edge weight being the move between them. A concept
//! is *simple* when this graph is connected (as undirected) and has clear
//! starting nodes for FSM-based recognition.

use crate::grid::{Coord, Direction};
use crate::matrix::SymbolMatrix;
use crate::{StructureError, StructureResult};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use petgraph::Direction::Incoming;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::warn;

/// A pattern-graph node: one non-blank pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternNode {
    pub coord: Coord,
    pub symbol: char,
}

/// The adjacency graph of one pattern matrix.
#[derive(Debug, Clone)]
pub struct PatternGraph {
    graph: DiGraph<PatternNode, Direction>,
    index: BTreeMap<Coord, NodeIndex>,
    first_node: Option<NodeIndex>,
    connected: bool,
    start_nodes: Vec<NodeIndex>,
}

impl PatternGraph {
    /// Build the pattern graph of `matrix`.
    pub fn build(matrix: &SymbolMatrix) -> Self {
        let mut graph = DiGraph::new();
        let mut index = BTreeMap::new();
        let mut first_node = None;

        for coord in matrix.non_blank() {
            let symbol = matrix.get(coord).unwrap_or(crate::matrix::BLANK);
            let idx = graph.add_node(PatternNode { coord, symbol });
            index.insert(coord, idx);
            if first_node.is_none() {
                first_node = Some(idx);
            }
        }

        for (&coord, &idx) in &index {
            for dir in Direction::ALL {
                if let Some(&nei) = index.get(&coord.step(dir)) {
                    graph.add_edge(idx, nei, dir);
                }
            }
        }

        let connected = is_connected(&graph);
        let start_nodes = if connected {
            determine_start_nodes(&graph)
        } else {
            Vec::new()
        };

        Self {
            graph,
            index,
            first_node,
            connected,
            start_nodes,
        }
    }

    /// Whether the pattern can be recognized by a single FSM.
    pub fn is_simple(&self) -> bool {
        self.connected && !self.start_nodes.is_empty()
    }

    /// Why the pattern is not simple, if it is not.
    pub fn check_simple(&self) -> StructureResult<()> {
        if self.first_node.is_none() {
            return Err(StructureError::EmptyPattern);
        }
        if !self.connected {
            return Err(StructureError::Disconnected);
        }
        if self.start_nodes.is_empty() {
            return Err(StructureError::NoStartNodes);
        }
        Ok(())
    }

    /// Whether the graph is connected as undirected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Node of the first non-blank coordinate in read order.
    pub fn first_node(&self) -> Option<NodeIndex> {
        self.first_node
    }

    /// Traversal start nodes (in-degree exactly 1).
    pub fn start_nodes(&self) -> &[NodeIndex] {
        &self.start_nodes
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn coord(&self, node: NodeIndex) -> Coord {
        self.graph[node].coord
    }

    pub fn symbol(&self, node: NodeIndex) -> char {
        self.graph[node].symbol
    }

    pub fn node_at(&self, coord: Coord) -> Option<NodeIndex> {
        self.index.get(&coord).copied()
    }

    /// The move labeling the edge `u -> v`, when adjacent.
    pub fn direction(&self, u: NodeIndex, v: NodeIndex) -> Option<Direction> {
        Direction::between(self.coord(u), self.coord(v))
    }

    /// Number of Moore neighbors of a node. Adjacency is symmetric, so
    /// the out-degree is the undirected degree.
    pub fn degree(&self, node: NodeIndex) -> usize {
        self.graph.neighbors(node).count()
    }

    /// In-degree of a node.
    pub fn in_degree(&self, node: NodeIndex) -> usize {
        self.graph.edges_directed(node, Incoming).count()
    }

    /// All node indices.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Successors of `node` in scan order (the order adjacency was built).
    fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let coord = self.coord(node);
        Direction::ALL
            .into_iter()
            .filter_map(|d| self.node_at(coord.step(d)))
            .collect()
    }

    /// BFS traversal order of coordinates from `root`.
    ///
    /// Used by the HOA learner to sweep candidate start positions so that
    /// structurally adjacent regions are considered together.
    pub fn bfs_order(&self, root: NodeIndex) -> Vec<Coord> {
        let mut order = Vec::with_capacity(self.graph.node_count());
        let mut seen = vec![false; self.graph.node_count()];
        let mut queue = VecDeque::new();
        seen[root.index()] = true;
        queue.push_back(root);
        while let Some(node) = queue.pop_front() {
            order.push(self.coord(node));
            for nei in self.successors(node) {
                if !seen[nei.index()] {
                    seen[nei.index()] = true;
                    queue.push_back(nei);
                }
            }
        }
        order
    }

    /// Depth-first decomposition into linear threads from `start`.
    ///
    /// On nodes with a single viable continuation the current thread is
    /// extended; at branch points the thread is closed and one recursive
    /// descent starts per unvisited branch. A continuation in the same
    /// direction as the incoming move is explored last (`last_append`),
    /// which keeps straight runs from being split by incidental branches.
    pub fn decompose(&self, start: NodeIndex) -> DfsDecomposition {
        let mut state = DfsState {
            graph: self,
            visited: vec![false; self.graph.node_count()],
            sequences: Vec::new(),
            return_back: vec![None],
            sequence: Vec::new(),
            parent: HashMap::new(),
        };
        state.visited[start.index()] = true;
        state.parent.insert(start, None);
        state.descend(start);
        DfsDecomposition {
            sequences: state.sequences,
            return_back: state.return_back,
            parent: state.parent,
        }
    }
}

/// The result of one DFS decomposition.
#[derive(Debug, Clone)]
pub struct DfsDecomposition {
    /// Coordinate runs, one per thread.
    pub sequences: Vec<Vec<NodeIndex>>,
    /// For each thread after the first, the thread its start attaches to.
    pub return_back: Vec<Option<usize>>,
    /// DFS predecessor of each visited node.
    pub parent: HashMap<NodeIndex, Option<NodeIndex>>,
}

struct DfsState<'a> {
    graph: &'a PatternGraph,
    visited: Vec<bool>,
    sequences: Vec<Vec<NodeIndex>>,
    return_back: Vec<Option<usize>>,
    sequence: Vec<NodeIndex>,
    parent: HashMap<NodeIndex, Option<NodeIndex>>,
}

impl DfsState<'_> {
    fn descend(&mut self, curr: NodeIndex) {
        self.sequence.push(curr);
        let sequence_index = self.sequences.len();

        let transition_move = self.parent[&curr]
            .and_then(|prev| self.graph.direction(prev, curr));

        // Same-direction continuation is re-ordered to be explored last.
        let mut move_forward = Vec::new();
        let mut last_append = None;
        for nei in self.graph.successors(curr) {
            if self.visited[nei.index()] {
                continue;
            }
            let forward_move = self.graph.direction(curr, nei);
            if transition_move.is_some() && forward_move == transition_move {
                last_append = Some(nei);
            } else {
                move_forward.push(nei);
            }
        }
        if let Some(n) = last_append {
            move_forward.push(n);
        }

        match move_forward.len() {
            0 => {
                self.sequences.push(std::mem::take(&mut self.sequence));
            }
            1 => {
                let next = move_forward[0];
                self.visited[next.index()] = true;
                self.parent.insert(next, Some(curr));
                self.descend(next);
            }
            _ => {
                self.sequences.push(std::mem::take(&mut self.sequence));
                for next in move_forward {
                    if !self.visited[next.index()] {
                        self.sequence = Vec::new();
                        self.return_back.push(Some(sequence_index));
                        self.visited[next.index()] = true;
                        self.parent.insert(next, Some(curr));
                        self.descend(next);
                    }
                }
            }
        }
    }
}

fn is_connected(graph: &DiGraph<PatternNode, Direction>) -> bool {
    if graph.node_count() == 0 {
        return false;
    }
    let mut uf = UnionFind::new(graph.node_count());
    for edge in graph.edge_references() {
        uf.union(edge.source().index(), edge.target().index());
    }
    let root = uf.find(0);
    (1..graph.node_count()).all(|i| uf.find(i) == root)
}

fn determine_start_nodes(graph: &DiGraph<PatternNode, Direction>) -> Vec<NodeIndex> {
    let mut starts = Vec::new();
    for node in graph.node_indices() {
        match graph.edges_directed(node, Incoming).count() {
            0 => warn!(coord = %graph[node].coord, "pattern node with in-degree 0"),
            1 => starts.push(node),
            _ => {}
        }
    }
    starts
}
