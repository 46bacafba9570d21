//! Structural comparison of higher-order automata.
//!
//! Two comparisons are provided: a total complexity order used to break
//! ties between equally-covering constituents during learning, and a
//! similarity measure over BFS label sequences used to relate concepts
//! (similar, sub-concept, identical) as they enter memory.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

use crate::model::Hoa;
use crate::store::AutomatonStore;

/// Weight of constituent-concept sequence similarity.
const FACTOR_NODES: f64 = 0.4;
/// Weight of move-label sequence similarity.
const FACTOR_LINKS: f64 = 0.4;
/// Weight of constraint-set similarity.
const FACTOR_CONSTRAINTS: f64 = 0.2;

// ============================================================================
// Complexity
// ============================================================================

/// Total order on structural complexity: fewer base FSMs, then fewer
/// edges, then fewer link constraints, then fewer identical-time pairs,
/// then fewer semi-identical pairs. `Less` means simpler.
pub fn compare_complexity(store: &AutomatonStore, a: &Hoa, b: &Hoa) -> Ordering {
    a.total_fsms(store)
        .cmp(&b.total_fsms(store))
        .then(a.edge_count().cmp(&b.edge_count()))
        .then(a.link_constraints.len().cmp(&b.link_constraints.len()))
        .then(a.identical_at.len().cmp(&b.identical_at.len()))
        .then(a.semi_identical_at.len().cmp(&b.semi_identical_at.len()))
}

// ============================================================================
// Similarity
// ============================================================================

/// How one automaton's concept relates to another by inheritance: the
/// father is the more general automaton (fewer constraints).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptRelation {
    pub father: String,
    pub son: String,
}

/// Outcome of comparing two higher-order automata.
#[derive(Debug, Clone, PartialEq)]
pub struct HoaComparison {
    /// Weighted similarity in `[0, 1]`.
    pub similarity: f64,
    /// Same constituent-concept and move-label sequences.
    pub identical_structure: bool,
    /// Same structure and same constraints.
    pub identical: bool,
    /// Inheritance relation, when one constraint set contains the other.
    pub relation: Option<ConceptRelation>,
}

/// Compares higher-order automata by their BFS label sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoaComparator;

impl HoaComparator {
    /// Compare `a` and `b`. Constraint similarity and inheritance are
    /// only meaningful on identical structure; otherwise the constraint
    /// factor contributes zero.
    pub fn compare(&self, a: &Hoa, b: &Hoa) -> HoaComparison {
        let sim_nodes = sequence_similarity(&a.bfs_concepts(), &b.bfs_concepts());
        let sim_links = sequence_similarity(&a.bfs_moves(), &b.bfs_moves());
        let identical_structure = sim_nodes == 1.0 && sim_links == 1.0;

        let mut sim_constraints = 0.0;
        let mut identical = false;
        let mut relation = None;
        if identical_structure {
            let a_cons = constraint_labels(a);
            let b_cons = constraint_labels(b);
            if a_cons == b_cons {
                identical = true;
                sim_constraints = 1.0;
                debug!(a = %a.concept, b = %b.concept, "identical automata");
            } else {
                sim_constraints = set_similarity(&a_cons, &b_cons);
                if a_cons.is_subset(&b_cons) {
                    relation = Some(ConceptRelation {
                        father: a.concept.clone(),
                        son: b.concept.clone(),
                    });
                } else if b_cons.is_subset(&a_cons) {
                    relation = Some(ConceptRelation {
                        father: b.concept.clone(),
                        son: a.concept.clone(),
                    });
                }
            }
        }

        HoaComparison {
            similarity: FACTOR_NODES * sim_nodes
                + FACTOR_LINKS * sim_links
                + FACTOR_CONSTRAINTS * sim_constraints,
            identical_structure,
            identical,
            relation,
        }
    }
}

/// Longest common subsequence length.
pub fn longest_common_subsequence<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table[a.len()][b.len()]
}

/// LCS length over the longer sequence; two empty sequences are fully
/// similar.
fn sequence_similarity(a: &[String], b: &[String]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    longest_common_subsequence(a, b) as f64 / longest as f64
}

fn set_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / longest as f64
}

/// All constraints of an automaton as canonical labels: time constraints
/// by node-id pair, link constraints by pair and constraint label.
fn constraint_labels(hoa: &Hoa) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();
    for &(i, j) in &hoa.identical_at {
        labels.insert(format!("T:{i}-{j}"));
    }
    for &(i, j) in &hoa.semi_identical_at {
        labels.insert(format!("S:{i}-{j}"));
    }
    for &(i, j, c) in &hoa.link_constraints {
        labels.insert(format!("L:{i}-{j}-{c}"));
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::HoaLearner;
    use mosaic_core::{learn_simple_concept, SymbolMatrix};

    fn line_store() -> AutomatonStore {
        let mut store = AutomatonStore::new();
        let h = learn_simple_concept(&SymbolMatrix::from_lines(&["xxx"])).unwrap();
        let v = learn_simple_concept(&SymbolMatrix::from_lines(&["x", "x", "x"])).unwrap();
        store.add_fsms("h_line", h.fsms);
        store.add_fsms("v_line", v.fsms);
        store
    }

    fn square(store: &AutomatonStore, name: &str) -> Hoa {
        let mat = SymbolMatrix::from_lines(&["xxx", "x x", "xxx"]);
        let mut hoa = HoaLearner::new(store).learn(name, &mat).unwrap();
        hoa.concept = name.to_string();
        hoa
    }

    #[test]
    fn test_lcs() {
        assert_eq!(longest_common_subsequence(b"abcde", b"ace"), 3);
        assert_eq!(longest_common_subsequence(b"abc", b"xyz"), 0);
        assert_eq!(longest_common_subsequence::<u8>(&[], b"abc"), 0);
    }

    #[test]
    fn test_identical_automata() {
        let store = line_store();
        let a = square(&store, "square_a");
        let b = square(&store, "square_b");
        let cmp = HoaComparator.compare(&a, &b);
        assert!(cmp.identical_structure);
        assert!(cmp.identical);
        assert!((cmp.similarity - 1.0).abs() < 1e-9);
        assert!(cmp.relation.is_none());
    }

    #[test]
    fn test_subconcept_relation() {
        let store = line_store();
        let father = square(&store, "rect");
        let mut son = square(&store, "strict_square");
        // The son adds a constraint the father does not have.
        son.identical_at.push((0, 3));
        let cmp = HoaComparator.compare(&father, &son);
        assert!(cmp.identical_structure);
        assert!(!cmp.identical);
        assert_eq!(
            cmp.relation,
            Some(ConceptRelation {
                father: "rect".to_string(),
                son: "strict_square".to_string(),
            })
        );
        assert!(cmp.similarity < 1.0 && cmp.similarity > 0.8);
    }

    #[test]
    fn test_different_structures_share_no_constraints() {
        let store = line_store();
        let sq = square(&store, "square");
        let mut single = Hoa::new("lone");
        single.graph.add_node(crate::model::HoaNode {
            id: 0,
            automaton: store.automata("h_line")[0],
            concept: "h_line".to_string(),
            activation_time: 3,
        });
        let cmp = HoaComparator.compare(&sq, &single);
        assert!(!cmp.identical_structure);
        assert!(cmp.similarity < 0.5);
        assert!(cmp.relation.is_none());
    }

    #[test]
    fn test_complexity_order() {
        let store = line_store();
        let sq = square(&store, "square");
        let mut single = Hoa::new("lone");
        single.graph.add_node(crate::model::HoaNode {
            id: 0,
            automaton: store.automata("h_line")[0],
            concept: "h_line".to_string(),
            activation_time: 3,
        });
        assert_eq!(compare_complexity(&store, &single, &sq), Ordering::Less);
        assert_eq!(compare_complexity(&store, &sq, &sq), Ordering::Equal);
    }
}
