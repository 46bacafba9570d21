//! The big-graph export: all of concept memory as one annotated graph.
//!
//! Every automaton and every automaton state becomes a node; edges
//! record implementation (automaton to state), transitions, constituent
//! dependencies, inheritance and similarity. The export is a persistence
//! boundary: it is built on demand from memory and serialized to JSON,
//! it is never read back into the runtime structures.

use mosaic_hoa::AutomatonRef;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::memory::ConceptMemory;

/// Kind of a big-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BigNodeKind {
    Fsm,
    FsmState,
    Hoa,
    HoaState,
}

/// One big-graph node with its export attributes.
#[derive(Debug, Clone, Serialize)]
pub struct BigNode {
    pub id: String,
    pub kind: BigNodeKind,
    /// Pattern text of the concept's first example, on automaton nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activating_symbol: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_time: Option<usize>,
}

/// One big-graph edge.
#[derive(Debug, Clone, Serialize)]
pub enum BigEdge {
    /// Automaton to one of its states.
    Implementation,
    /// FSM state to FSM state, labeled with the transition input.
    FsmTransition { symbol: String },
    /// HOA state to the automaton of its constituent concept.
    Dependency,
    /// HOA state to HOA state, labeled with move and constraints.
    HoaTransition {
        move_type: String,
        constraints: Vec<String>,
    },
    /// Inheritance, father to son.
    Extension,
    /// Weighted structural similarity.
    Similarity { weight: f64 },
}

/// The exported view of concept memory.
#[derive(Debug, Serialize)]
pub struct MemoryGraph {
    pub graph: DiGraph<BigNode, BigEdge>,
}

impl MemoryGraph {
    /// Build the export graph from memory.
    pub fn build(memory: &ConceptMemory) -> Self {
        let mut graph = DiGraph::new();
        // Concept name to the node of its first automaton, the anchor
        // that dependency, inheritance and similarity edges attach to.
        let mut anchors: BTreeMap<String, NodeIndex> = BTreeMap::new();
        let store = memory.store();

        for concept in store.base_concepts() {
            for (k, aref) in store.automata(concept).iter().enumerate() {
                let AutomatonRef::Fsm(id) = aref else {
                    continue;
                };
                let fsm = store.fsm(*id);
                let automaton = graph.add_node(BigNode {
                    id: format!("FSM:{concept}:{k}"),
                    kind: BigNodeKind::Fsm,
                    pattern: memory.first_pattern(concept).map(|m| m.to_text()),
                    activating_symbol: Some(fsm.activating_symbol),
                    activation_time: None,
                });
                anchors.entry(concept.clone()).or_insert(automaton);

                let states: Vec<NodeIndex> = fsm
                    .states
                    .iter()
                    .map(|state| {
                        let node = graph.add_node(BigNode {
                            id: format!("FSM:{concept}:{k}:{}", state.name),
                            kind: BigNodeKind::FsmState,
                            pattern: None,
                            activating_symbol: None,
                            activation_time: None,
                        });
                        graph.add_edge(automaton, node, BigEdge::Implementation);
                        node
                    })
                    .collect();
                for (i, state) in fsm.states.iter().enumerate() {
                    for &(input, target) in &state.transitions {
                        graph.add_edge(
                            states[i],
                            states[target],
                            BigEdge::FsmTransition {
                                symbol: input.to_string(),
                            },
                        );
                    }
                }
            }
        }

        for concept in store.hoa_concepts() {
            for (k, aref) in store.automata(concept).iter().enumerate() {
                let AutomatonRef::Hoa(id) = aref else {
                    continue;
                };
                let hoa = store.hoa(*id);
                let automaton = graph.add_node(BigNode {
                    id: format!("HOA:{concept}:{k}"),
                    kind: BigNodeKind::Hoa,
                    pattern: memory.first_pattern(concept).map(|m| m.to_text()),
                    activating_symbol: None,
                    activation_time: None,
                });
                anchors.entry(concept.clone()).or_insert(automaton);

                let states: Vec<NodeIndex> = hoa
                    .graph
                    .node_weights()
                    .map(|weight| {
                        let node = graph.add_node(BigNode {
                            id: format!("HOA:{concept}:{k}:N_{}", weight.id),
                            kind: BigNodeKind::HoaState,
                            pattern: None,
                            activating_symbol: None,
                            activation_time: Some(weight.activation_time),
                        });
                        graph.add_edge(automaton, node, BigEdge::Implementation);
                        node
                    })
                    .collect();
                for edge in hoa.graph.edge_indices() {
                    if let (Some((src, dst)), Some(weight)) =
                        (hoa.graph.edge_endpoints(edge), hoa.graph.edge_weight(edge))
                    {
                        graph.add_edge(
                            states[src.index()],
                            states[dst.index()],
                            BigEdge::HoaTransition {
                                move_type: weight.move_type.to_string(),
                                constraints: weight
                                    .constraints
                                    .iter()
                                    .map(ToString::to_string)
                                    .collect(),
                            },
                        );
                    }
                }
                for (state, weight) in states.iter().zip(hoa.graph.node_weights()) {
                    if let Some(&anchor) = anchors.get(&weight.concept) {
                        graph.add_edge(*state, anchor, BigEdge::Dependency);
                    }
                }
            }
        }

        for (father, son) in memory.inheritance_edges() {
            if let (Some(&f), Some(&s)) = (anchors.get(&father), anchors.get(&son)) {
                graph.add_edge(f, s, BigEdge::Extension);
            }
        }
        for (a, b, weight) in memory.similarity_edges() {
            if let (Some(&na), Some(&nb)) = (anchors.get(&a), anchors.get(&b)) {
                graph.add_edge(na, nb, BigEdge::Similarity { weight });
            }
        }

        Self { graph }
    }

    /// Serialize the export graph to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
