//! The HOA learner: decomposes a complex pattern into activations of
//! previously learned automata and records their dependencies.
//!
//! The learner sweeps candidate start coordinates in BFS order over the
//! pattern graph. At each unclaimed coordinate it prefers higher-order
//! constituents (largest activation, then simplest structure) and falls
//! back to base FSMs (first fit that claims new ground). Once the sweep
//! covers the pattern, pairwise dependencies between the recorded
//! activations become the edges of the new automaton.

use mosaic_core::{Activation, Coord, Direction, PatternGraph, SymbolMatrix};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use crate::compare::compare_complexity;
use crate::model::{Hoa, HoaEdge, HoaNode, LinkConstraint, MoveType};
use crate::store::{apply_automaton, AutomatonRef, AutomatonStore};

/// Why a pattern could not be learned as a higher-order concept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HoaLearnError {
    #[error("no constituent automaton activates on the pattern")]
    NoActivations,
    #[error("constituent activations leave {missing} field(s) uncovered")]
    IncompleteCoverage { missing: usize },
    #[error("constituent dependency graph is disconnected")]
    Disconnected,
}

/// One constituent chosen during the sweep, in firing order.
struct ConstituentActivation {
    concept: String,
    automaton: AutomatonRef,
    activation: Activation,
}

/// Learns a higher-order automaton over the automata already in a store.
pub struct HoaLearner<'a> {
    store: &'a AutomatonStore,
    excluded: BTreeSet<String>,
}

impl<'a> HoaLearner<'a> {
    pub fn new(store: &'a AutomatonStore) -> Self {
        Self {
            store,
            excluded: BTreeSet::new(),
        }
    }

    /// A learner that ignores the named concepts as constituents. Used
    /// when relearning after a concept removal.
    pub fn with_excluded(store: &'a AutomatonStore, excluded: BTreeSet<String>) -> Self {
        Self { store, excluded }
    }

    /// Learn `matrix` as the higher-order concept `concept`.
    pub fn learn(&self, concept: &str, matrix: &SymbolMatrix) -> Result<Hoa, HoaLearnError> {
        let graph = PatternGraph::build(matrix);
        let Some(first) = graph.first_node() else {
            return Err(HoaLearnError::NoActivations);
        };

        let mut claimed: BTreeSet<Coord> = BTreeSet::new();
        let mut constituents: Vec<ConstituentActivation> = Vec::new();

        for coord in graph.bfs_order(first) {
            if claimed.contains(&coord) {
                continue;
            }
            let found = self
                .best_hoa_activation(matrix, coord, &claimed)
                .or_else(|| self.first_fsm_activation(matrix, coord, &claimed));
            if let Some(constituent) = found {
                claimed.extend(constituent.activation.visited.iter().copied());
                debug!(
                    concept = %constituent.concept,
                    at = %coord,
                    time = constituent.activation.time,
                    "constituent activated"
                );
                constituents.push(constituent);
            }
        }

        if constituents.is_empty() {
            return Err(HoaLearnError::NoActivations);
        }
        let missing = matrix
            .non_blank()
            .into_iter()
            .filter(|c| !claimed.contains(c))
            .count();
        if missing > 0 {
            return Err(HoaLearnError::IncompleteCoverage { missing });
        }

        let hoa = self.assemble(concept, &constituents);
        if hoa.node_count() > 1 && !hoa.is_connected() {
            return Err(HoaLearnError::Disconnected);
        }
        Ok(hoa)
    }

    /// Best higher-order activation at `coord`: among HOAs whose visited
    /// fields are disjoint from the claimed set, the one with the largest
    /// activation, ties broken toward the structurally simpler automaton.
    fn best_hoa_activation(
        &self,
        matrix: &SymbolMatrix,
        coord: Coord,
        claimed: &BTreeSet<Coord>,
    ) -> Option<ConstituentActivation> {
        let mut best: Option<ConstituentActivation> = None;
        for name in self.store.hoa_concepts() {
            if self.excluded.contains(name) {
                continue;
            }
            for &aref in self.store.automata(name) {
                let Some(act) = apply_automaton(self.store, aref, matrix, coord) else {
                    continue;
                };
                if act.visited.iter().any(|c| claimed.contains(c)) {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some(current) => {
                        act.time > current.activation.time
                            || (act.time == current.activation.time
                                && self.simpler(aref, current.automaton))
                    }
                };
                if better {
                    best = Some(ConstituentActivation {
                        concept: name.clone(),
                        automaton: aref,
                        activation: act,
                    });
                }
            }
        }
        best
    }

    /// First base-FSM activation at `coord` that claims at least one
    /// previously unclaimed field.
    fn first_fsm_activation(
        &self,
        matrix: &SymbolMatrix,
        coord: Coord,
        claimed: &BTreeSet<Coord>,
    ) -> Option<ConstituentActivation> {
        for name in self.store.base_concepts() {
            if self.excluded.contains(name) {
                continue;
            }
            for &aref in self.store.automata(name) {
                let Some(act) = apply_automaton(self.store, aref, matrix, coord) else {
                    continue;
                };
                if act.visited.iter().any(|c| !claimed.contains(c)) {
                    return Some(ConstituentActivation {
                        concept: name.clone(),
                        automaton: aref,
                        activation: act,
                    });
                }
            }
        }
        None
    }

    fn simpler(&self, a: AutomatonRef, b: AutomatonRef) -> bool {
        match (a, b) {
            (AutomatonRef::Hoa(a), AutomatonRef::Hoa(b)) => {
                compare_complexity(self.store, self.store.hoa(a), self.store.hoa(b)).is_lt()
            }
            // A base FSM is always simpler than a composition.
            (AutomatonRef::Fsm(_), AutomatonRef::Hoa(_)) => true,
            _ => false,
        }
    }

    /// Build the automaton graph from the recorded firing order.
    fn assemble(&self, concept: &str, constituents: &[ConstituentActivation]) -> Hoa {
        let mut hoa = Hoa::new(concept);
        let nodes: Vec<_> = constituents
            .iter()
            .enumerate()
            .map(|(id, c)| {
                hoa.graph.add_node(HoaNode {
                    id,
                    automaton: c.automaton,
                    concept: c.concept.clone(),
                    activation_time: c.activation.time,
                })
            })
            .collect();

        for j in 1..constituents.len() {
            for i in 0..j {
                let (ti, tj) = (constituents[i].activation.time, constituents[j].activation.time);
                if ti == tj {
                    hoa.identical_at.push((i, j));
                } else if ti.abs_diff(tj) == 1 {
                    hoa.semi_identical_at.push((i, j));
                }

                let (move_type, constraints) =
                    infer_dependency(&constituents[i].activation, &constituents[j].activation);
                if move_type == MoveType::None && constraints.is_empty() {
                    continue;
                }
                for &constraint in &constraints {
                    hoa.link_constraints.push((i, j, constraint));
                }
                hoa.graph.add_edge(
                    nodes[i],
                    nodes[j],
                    HoaEdge {
                        move_type,
                        constraints,
                    },
                );
            }
        }
        hoa
    }
}

/// Derive the positional dependency of activation `succ` on activation
/// `pred`: the move locating `succ`'s start, and the link constraints
/// tying the two activations' geometry together.
fn infer_dependency(pred: &Activation, succ: &Activation) -> (MoveType, Vec<LinkConstraint>) {
    let move_type = infer_move(pred, succ);

    let mut constraints = Vec::new();
    if pred.end().is_some() && pred.end() == succ.end() {
        constraints.push(LinkConstraint::End);
    } else if let Some(succ_end) = succ.end() {
        for &m in pred.interior() {
            if let Some(d) = Direction::between(succ_end, m) {
                constraints.push(LinkConstraint::Incident(d));
            }
        }
    }
    (move_type, constraints)
}

fn infer_move(pred: &Activation, succ: &Activation) -> MoveType {
    let Some(succ_start) = succ.start() else {
        return MoveType::None;
    };
    if pred.start() == succ.start() {
        return MoveType::Start;
    }
    if let Some(d) = pred.end().and_then(|e| Direction::between(e, succ_start)) {
        return MoveType::EndOffset(d);
    }
    if let Some(d) = pred.start().and_then(|s| Direction::between(s, succ_start)) {
        return MoveType::StartOffset(d);
    }
    // Incident moves are ambiguous when several interior coordinates
    // touch the successor's start; the shortest label wins, then
    // lexicographic order.
    let mut incident: Vec<Direction> = pred
        .interior()
        .iter()
        .filter_map(|&m| Direction::between(m, succ_start))
        .collect();
    incident.sort_by_key(|d| (d.label().len(), d.label()));
    match incident.first() {
        Some(&d) => MoveType::Incident(d),
        None => MoveType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::HoaRecognizer;
    use mosaic_core::learn_simple_concept;

    fn line_store() -> AutomatonStore {
        let mut store = AutomatonStore::new();
        let h = learn_simple_concept(&SymbolMatrix::from_lines(&["xxx"])).unwrap();
        let v = learn_simple_concept(&SymbolMatrix::from_lines(&["x", "x", "x"])).unwrap();
        store.add_fsms("h_line", h.fsms);
        store.add_fsms("v_line", v.fsms);
        store
    }

    fn hollow_square() -> SymbolMatrix {
        SymbolMatrix::from_lines(&["xxx", "x x", "xxx"])
    }

    #[test]
    fn test_square_learned_from_lines() {
        let store = line_store();
        let hoa = HoaLearner::new(&store)
            .learn("square", &hollow_square())
            .expect("square decomposes into four lines");
        assert_eq!(hoa.node_count(), 4);
        assert_eq!(hoa.edge_count(), 4);
        assert!(hoa.is_connected());
        // Top row fires for 3 steps, the other three sides for 2.
        assert_eq!(hoa.graph[hoa.entry()].activation_time, 3);
        assert_eq!(hoa.identical_at.len(), 3);
        assert_eq!(hoa.semi_identical_at.len(), 3);
    }

    #[test]
    fn test_learned_square_recognizes_itself() {
        let store = line_store();
        let mat = hollow_square();
        let hoa = HoaLearner::new(&store).learn("square", &mat).unwrap();
        let act = HoaRecognizer::apply(&store, &hoa, &mat, Coord::new(0, 0))
            .expect("round trip must hold");
        let fields: BTreeSet<Coord> = act.visited.iter().copied().collect();
        assert!(mat.covered_by(&fields));
    }

    #[test]
    fn test_empty_store_yields_no_activations() {
        let store = AutomatonStore::new();
        let err = HoaLearner::new(&store)
            .learn("square", &hollow_square())
            .unwrap_err();
        assert_eq!(err, HoaLearnError::NoActivations);
    }

    #[test]
    fn test_partial_coverage_reported() {
        let mut store = AutomatonStore::new();
        let h = learn_simple_concept(&SymbolMatrix::from_lines(&["xxx"])).unwrap();
        store.add_fsms("h_line", h.fsms);
        // Horizontal lines alone cannot cover the left column stub.
        let mat = SymbolMatrix::from_lines(&["xxx", "x  "]);
        let err = HoaLearner::new(&store).learn("flag", &mat).unwrap_err();
        assert_eq!(err, HoaLearnError::IncompleteCoverage { missing: 1 });
    }

    #[test]
    fn test_excluded_concept_is_not_used() {
        let store = line_store();
        let excluded = BTreeSet::from(["h_line".to_string()]);
        let err = HoaLearner::with_excluded(&store, excluded)
            .learn("square", &hollow_square())
            .unwrap_err();
        // Vertical lines alone cannot cover the horizontal rows.
        assert!(matches!(err, HoaLearnError::IncompleteCoverage { .. }));
    }

    #[test]
    fn test_disconnected_pattern_is_uncoverable() {
        let store = line_store();
        // The sweep never reaches the second component.
        let mat = SymbolMatrix::from_lines(&["xxx", "   ", "   ", "xxx"]);
        let err = HoaLearner::new(&store).learn("pair", &mat).unwrap_err();
        assert!(matches!(err, HoaLearnError::IncompleteCoverage { .. }));
    }

    #[test]
    fn test_higher_order_constituent_preferred() {
        let mut store = line_store();
        let square = HoaLearner::new(&store)
            .learn("square", &hollow_square())
            .unwrap();
        store.add_hoa("square", square);

        // With the square concept available, a square-shaped pattern is
        // claimed by one higher-order constituent rather than four lines.
        let hoa = HoaLearner::new(&store)
            .learn("box", &hollow_square())
            .expect("single-constituent decomposition");
        assert_eq!(hoa.node_count(), 1);
        assert_eq!(hoa.graph[hoa.entry()].concept, "square");
    }
}
