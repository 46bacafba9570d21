//! Integration tests for concept memory maintenance
//!
//! Tests cascading removal, relearning, relationship nets and the
//! big-graph export across the full stack.

use mosaic_core::SymbolMatrix;
use mosaic_engine::{learn_complex_concept, remove_concept_and_relearn, SupervisedLearner};
use mosaic_memory::{BigNodeKind, ConceptMemory, MemoryGraph};
use std::collections::BTreeSet;

fn hollow_square() -> SymbolMatrix {
    SymbolMatrix::from_lines(&["xxx", "x x", "xxx"])
}

fn teach_lines(memory: &mut ConceptMemory) {
    SupervisedLearner::learn(memory, "h_line", &SymbolMatrix::from_lines(&["xxx"])).unwrap();
    SupervisedLearner::learn(memory, "v_line", &SymbolMatrix::from_lines(&["x", "x", "x"]))
        .unwrap();
}

/// Removing a base concept removes exactly its transitive dependents.
#[test]
fn test_deletion_cascade() {
    let mut memory = ConceptMemory::new();
    teach_lines(&mut memory);
    SupervisedLearner::learn(&mut memory, "square", &hollow_square()).unwrap();
    learn_complex_concept("box", &hollow_square(), &mut memory, &BTreeSet::new()).unwrap();

    let affected = memory.remove_concept("h_line");
    let names: BTreeSet<&str> = affected.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, BTreeSet::from(["square", "box"]));
    assert!(memory.has_concept("v_line"));
    assert!(!memory.has_concept("square"));
    assert!(!memory.has_concept("box"));
}

/// Removing a mid-level concept relearns its dependents from their
/// recorded patterns using the remaining concepts.
#[test]
fn test_removal_with_relearning() {
    let mut memory = ConceptMemory::new();
    teach_lines(&mut memory);
    SupervisedLearner::learn(&mut memory, "square", &hollow_square()).unwrap();
    learn_complex_concept("box", &hollow_square(), &mut memory, &BTreeSet::new()).unwrap();

    let relearned = remove_concept_and_relearn(&mut memory, "square");
    assert_eq!(relearned, vec!["box".to_string()]);
    assert!(!memory.has_concept("square"));

    // The relearned box is now composed of lines, not of the square.
    let deps: BTreeSet<(String, String)> = memory.dependency_edges().into_iter().collect();
    assert!(deps.contains(&("box".to_string(), "h_line".to_string())));
    assert!(deps.contains(&("box".to_string(), "v_line".to_string())));
    let satisfied = memory.retrieve_satisfiable_hoa_concepts(&hollow_square());
    assert!(satisfied.iter().any(|(n, _)| n == "box"));
}

/// Structurally identical concepts end up linked in the similarity net.
#[test]
fn test_similarity_net_after_learning_twins() {
    let mut memory = ConceptMemory::new();
    teach_lines(&mut memory);
    learn_complex_concept("square_a", &hollow_square(), &mut memory, &BTreeSet::new()).unwrap();
    // Exclude the twin so the second square decomposes into lines too
    // instead of wrapping the first square as a single constituent.
    let excluded = BTreeSet::from(["square_a".to_string()]);
    learn_complex_concept("square_b", &hollow_square(), &mut memory, &excluded).unwrap();

    let edges = memory.similarity_edges();
    assert_eq!(edges.len(), 1);
    let (a, b, weight) = &edges[0];
    let pair = BTreeSet::from([a.as_str(), b.as_str()]);
    assert_eq!(pair, BTreeSet::from(["square_a", "square_b"]));
    assert!((weight - 1.0).abs() < 1e-9);
}

/// Promotion renames the concept everywhere: store, patterns, nets and
/// constituent references of dependent automata.
#[test]
fn test_promotion_rewrites_all_references() {
    let mut memory = ConceptMemory::new();
    teach_lines(&mut memory);
    learn_complex_concept(
        "UNKNOWN-HOA-77",
        &hollow_square(),
        &mut memory,
        &BTreeSet::new(),
    )
    .unwrap();
    learn_complex_concept("box", &hollow_square(), &mut memory, &BTreeSet::new()).unwrap();

    memory.reconfigure_unsupervised_concept("UNKNOWN-HOA-77", "square", None);
    assert!(memory.has_concept("square"));
    assert!(!memory.has_concept("UNKNOWN-HOA-77"));

    let deps: BTreeSet<(String, String)> = memory.dependency_edges().into_iter().collect();
    assert!(deps.contains(&("box".to_string(), "square".to_string())));
    assert!(deps.contains(&("square".to_string(), "h_line".to_string())));
}

/// The big-graph export reflects everything memory knows and round-trips
/// through JSON text.
#[test]
fn test_big_graph_export() {
    let mut memory = ConceptMemory::new();
    teach_lines(&mut memory);
    SupervisedLearner::learn(&mut memory, "square", &hollow_square()).unwrap();

    let export = MemoryGraph::build(&memory);
    let kinds: Vec<BigNodeKind> = export.graph.node_weights().map(|n| n.kind).collect();
    assert!(kinds.contains(&BigNodeKind::Fsm));
    assert!(kinds.contains(&BigNodeKind::Hoa));
    assert!(kinds.contains(&BigNodeKind::FsmState));
    assert!(kinds.contains(&BigNodeKind::HoaState));

    let json = export.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value.get("graph").is_some());
    assert!(json.contains("HOA:square:0"));
    assert!(json.contains("Dependency"));
}
