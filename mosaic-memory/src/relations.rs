//! Relationship graphs between concept names.
//!
//! Concept memory keeps three nets over concepts: inheritance (father to
//! son), dependency (composed concept to constituent) and similarity
//! (undirected, weighted). Nodes are concept names; the graphs are small
//! and rebuilt-friendly, so removal just reindexes.

use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction::Incoming;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// ============================================================================
// Directed Relations
// ============================================================================

/// A directed relation over concept names.
#[derive(Debug, Default, Clone)]
pub struct RelationGraph {
    graph: DiGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, name: &str) -> NodeIndex {
        match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                let idx = self.graph.add_node(name.to_string());
                self.index.insert(name.to_string(), idx);
                idx
            }
        }
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        let (a, b) = (self.ensure(from), self.ensure(to));
        if !self.graph.contains_edge(a, b) {
            self.graph.add_edge(a, b, ());
        }
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Direct successors of a concept.
    pub fn successors(&self, name: &str) -> Vec<String> {
        match self.index.get(name) {
            Some(&idx) => self
                .graph
                .neighbors(idx)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// All concepts with a directed path to `name`, excluding `name`.
    pub fn reaching(&self, name: &str) -> BTreeSet<String> {
        let mut reaching = BTreeSet::new();
        let Some(&target) = self.index.get(name) else {
            return reaching;
        };
        let mut queue = VecDeque::from([target]);
        let mut seen = BTreeSet::from([target]);
        while let Some(node) = queue.pop_front() {
            for pred in self.graph.neighbors_directed(node, Incoming) {
                if seen.insert(pred) {
                    reaching.insert(self.graph[pred].clone());
                    queue.push_back(pred);
                }
            }
        }
        reaching
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(idx) = self.index.remove(old) {
            self.graph[idx] = new.to_string();
            self.index.insert(new.to_string(), idx);
        }
    }

    /// Drop a concept and its incident edges. Node indices shift, so the
    /// name index is rebuilt.
    pub fn remove(&mut self, name: &str) {
        if let Some(&idx) = self.index.get(name) {
            self.graph.remove_node(idx);
            self.index = self
                .graph
                .node_indices()
                .map(|n| (self.graph[n].clone(), n))
                .collect();
        }
    }

    /// All edges as (from, to) name pairs.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].clone(),
                    self.graph[e.target()].clone(),
                )
            })
            .collect()
    }
}

// ============================================================================
// Similarity
// ============================================================================

/// The undirected weighted similarity net.
#[derive(Debug, Default, Clone)]
pub struct SimilarityGraph {
    graph: UnGraph<String, f64>,
    index: BTreeMap<String, NodeIndex>,
}

impl SimilarityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, name: &str) -> NodeIndex {
        match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                let idx = self.graph.add_node(name.to_string());
                self.index.insert(name.to_string(), idx);
                idx
            }
        }
    }

    /// Record (or update) the similarity between two concepts.
    pub fn set(&mut self, a: &str, b: &str, weight: f64) {
        let (na, nb) = (self.ensure(a), self.ensure(b));
        match self.graph.find_edge(na, nb) {
            Some(edge) => self.graph[edge] = weight,
            None => {
                self.graph.add_edge(na, nb, weight);
            }
        }
    }

    pub fn weight(&self, a: &str, b: &str) -> Option<f64> {
        let (&na, &nb) = (self.index.get(a)?, self.index.get(b)?);
        self.graph.find_edge(na, nb).map(|e| self.graph[e])
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(idx) = self.index.remove(old) {
            self.graph[idx] = new.to_string();
            self.index.insert(new.to_string(), idx);
        }
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(&idx) = self.index.get(name) {
            self.graph.remove_node(idx);
            self.index = self
                .graph
                .node_indices()
                .map(|n| (self.graph[n].clone(), n))
                .collect();
        }
    }

    /// All edges as (a, b, weight) triples.
    pub fn edges(&self) -> Vec<(String, String, f64)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].clone(),
                    self.graph[e.target()].clone(),
                    *e.weight(),
                )
            })
            .collect()
    }
}
