//! Concept memory: every learned concept, its automata, its example
//! patterns and its relationships to other concepts.
//!
//! Memory owns the automaton store and layers three relationship nets on
//! top of it (inheritance, dependency, similarity), maintained as
//! concepts enter. Unsupervised learning registers concepts under
//! generated `UNKNOWN-*` names that can later be promoted to real names.

use mosaic_core::{Coord, Fsm, SymbolMatrix};
use mosaic_hoa::{
    apply_automaton, AutomatonRef, AutomatonStore, Hoa, HoaComparator, HoaRecognizer,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::relations::{RelationGraph, SimilarityGraph};

/// Name prefix of unsupervised base concepts.
pub const UNKNOWN_FSM_PREFIX: &str = "UNKNOWN-FSM-";
/// Name prefix of unsupervised higher-order concepts.
pub const UNKNOWN_HOA_PREFIX: &str = "UNKNOWN-HOA-";

/// A near-miss recorded while scanning memory for a satisfiable concept.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialActivation {
    pub concept: String,
    pub automaton: AutomatonRef,
    pub score: f64,
}

/// The agent's long-term concept memory.
#[derive(Debug, Default)]
pub struct ConceptMemory {
    store: AutomatonStore,
    patterns: BTreeMap<String, Vec<SymbolMatrix>>,
    next_unknown_base: usize,
    next_unknown_hoa: usize,
    inheritance: RelationGraph,
    dependency: RelationGraph,
    similarity: SimilarityGraph,
    partial_activations: Vec<PartialActivation>,
}

impl ConceptMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &AutomatonStore {
        &self.store
    }

    pub fn has_concept(&self, concept: &str) -> bool {
        self.store.has_concept(concept)
    }

    /// Example patterns recorded for a concept, oldest first.
    pub fn patterns(&self, concept: &str) -> &[SymbolMatrix] {
        self.patterns.get(concept).map_or(&[], Vec::as_slice)
    }

    pub fn first_pattern(&self, concept: &str) -> Option<&SymbolMatrix> {
        self.patterns(concept).first()
    }

    pub fn inheritance_edges(&self) -> Vec<(String, String)> {
        self.inheritance.edges()
    }

    pub fn dependency_edges(&self) -> Vec<(String, String)> {
        self.dependency.edges()
    }

    pub fn similarity_edges(&self) -> Vec<(String, String, f64)> {
        self.similarity.edges()
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Register base FSMs for a concept. Re-adding a known concept
    /// extends its automaton list rather than replacing it.
    pub fn add_base_concept(&mut self, concept: &str, fsms: Vec<Fsm>, pattern: SymbolMatrix) {
        info!(concept, count = fsms.len(), "adding base concept");
        self.store.add_fsms(concept, fsms);
        self.patterns
            .entry(concept.to_string())
            .or_default()
            .push(pattern);
    }

    /// Register a higher-order automaton for a concept, extending the
    /// dependency net with its constituents and relating it to every
    /// existing higher-order concept by structural similarity.
    pub fn add_hoa_concept(&mut self, concept: &str, hoa: Hoa, pattern: SymbolMatrix) {
        info!(concept, nodes = hoa.node_count(), "adding higher-order concept");
        for node in hoa.graph.node_weights() {
            if !self.dependency.contains_edge(concept, &node.concept) {
                self.dependency.add_edge(concept, &node.concept);
            }
        }

        let comparator = HoaComparator;
        for other in self.store.hoa_concepts().clone() {
            if other == concept {
                continue;
            }
            let Some(&AutomatonRef::Hoa(id)) = self.store.automata(&other).first() else {
                continue;
            };
            let cmp = comparator.compare(&hoa, self.store.hoa(id));
            if cmp.similarity > 0.0 {
                self.similarity.set(concept, &other, cmp.similarity);
            }
            if let Some(rel) = cmp.relation {
                debug!(father = %rel.father, son = %rel.son, "inheritance detected");
                self.inheritance.add_edge(&rel.father, &rel.son);
            }
        }

        self.store.add_hoa(concept, hoa);
        self.patterns
            .entry(concept.to_string())
            .or_default()
            .push(pattern);
    }

    // ------------------------------------------------------------------
    // Unsupervised Names
    // ------------------------------------------------------------------

    /// Allocate a fresh unsupervised concept name.
    pub fn unknown_concept_id(&mut self, base: bool) -> String {
        if base {
            self.next_unknown_base += 1;
            format!("{UNKNOWN_FSM_PREFIX}{}", self.next_unknown_base)
        } else {
            self.next_unknown_hoa += 1;
            format!("{UNKNOWN_HOA_PREFIX}{}", self.next_unknown_hoa)
        }
    }

    pub fn is_unsupervised_concept(concept: &str) -> bool {
        concept.starts_with(UNKNOWN_FSM_PREFIX) || concept.starts_with(UNKNOWN_HOA_PREFIX)
    }

    /// Promote an unsupervised concept to a supervised name, rewriting
    /// every reference across the store and the relationship nets.
    pub fn reconfigure_unsupervised_concept(
        &mut self,
        old: &str,
        new: &str,
        extra_pattern: Option<SymbolMatrix>,
    ) {
        info!(old, new, "promoting unsupervised concept");
        self.store.rename_concept(old, new);
        if let Some(patterns) = self.patterns.remove(old) {
            self.patterns
                .entry(new.to_string())
                .or_default()
                .extend(patterns);
        }
        if let Some(pattern) = extra_pattern {
            self.patterns
                .entry(new.to_string())
                .or_default()
                .push(pattern);
        }
        self.inheritance.rename(old, new);
        self.dependency.rename(old, new);
        self.similarity.rename(old, new);
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    /// Higher-order concepts recognizing `matrix` with full coverage from
    /// some start coordinate. Near-misses are recorded as partial
    /// activations, best first.
    pub fn retrieve_satisfiable_hoa_concepts(
        &mut self,
        matrix: &SymbolMatrix,
    ) -> Vec<(String, AutomatonRef)> {
        let coords = matrix.non_blank();
        let mut satisfied = Vec::new();
        let mut partials = Vec::new();

        for name in self.store.hoa_concepts() {
            for &aref in self.store.automata(name) {
                let mut matched = false;
                let mut best_score = 0.0f64;
                for &start in &coords {
                    if let Some(act) = apply_automaton(&self.store, aref, matrix, start) {
                        let fields: BTreeSet<Coord> = act.visited.iter().copied().collect();
                        if matrix.covered_by(&fields) {
                            satisfied.push((name.clone(), aref));
                            matched = true;
                            break;
                        }
                    }
                    if let AutomatonRef::Hoa(id) = aref {
                        let score = HoaRecognizer::activation_score(
                            &self.store,
                            self.store.hoa(id),
                            matrix,
                            start,
                        );
                        best_score = best_score.max(score);
                    }
                }
                if !matched && best_score > 0.0 {
                    partials.push(PartialActivation {
                        concept: name.clone(),
                        automaton: aref,
                        score: best_score,
                    });
                }
            }
        }

        partials.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.partial_activations = partials;
        satisfied
    }

    /// Base concepts recognizing `matrix` with full coverage from some
    /// start coordinate.
    pub fn retrieve_satisfiable_basic_concepts(
        &self,
        matrix: &SymbolMatrix,
    ) -> Vec<(String, AutomatonRef)> {
        let coords = matrix.non_blank();
        let mut satisfied = Vec::new();
        for name in self.store.base_concepts() {
            for &aref in self.store.automata(name) {
                for &start in &coords {
                    if let Some(act) = apply_automaton(&self.store, aref, matrix, start) {
                        let fields: BTreeSet<Coord> = act.visited.iter().copied().collect();
                        if matrix.covered_by(&fields) {
                            satisfied.push((name.clone(), aref));
                            break;
                        }
                    }
                }
            }
        }
        satisfied
    }

    /// Near-misses recorded by the latest higher-order retrieval, best
    /// first.
    pub fn partial_activations(&self) -> &[PartialActivation] {
        &self.partial_activations
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove a concept and every concept that transitively depends on
    /// it. Returns the removed dependents with their first pattern so the
    /// caller can relearn them without the removed concept.
    pub fn remove_concept(&mut self, concept: &str) -> Vec<(String, SymbolMatrix)> {
        let dependents = self.dependency.reaching(concept);
        info!(concept, dependents = dependents.len(), "removing concept");

        let affected: Vec<(String, SymbolMatrix)> = dependents
            .iter()
            .filter_map(|dep| {
                self.first_pattern(dep)
                    .cloned()
                    .map(|pattern| (dep.clone(), pattern))
            })
            .collect();

        let root = concept.to_string();
        for name in dependents.iter().chain(std::iter::once(&root)) {
            self.store.remove_concept(name);
            self.patterns.remove(name);
            self.inheritance.remove(name);
            self.dependency.remove(name);
            self.similarity.remove(name);
        }
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::learn_simple_concept;
    use mosaic_hoa::HoaLearner;

    fn hollow_square() -> SymbolMatrix {
        SymbolMatrix::from_lines(&["xxx", "x x", "xxx"])
    }

    fn memory_with_lines() -> ConceptMemory {
        let mut memory = ConceptMemory::new();
        let h_mat = SymbolMatrix::from_lines(&["xxx"]);
        let v_mat = SymbolMatrix::from_lines(&["x", "x", "x"]);
        let h = learn_simple_concept(&h_mat).unwrap();
        let v = learn_simple_concept(&v_mat).unwrap();
        memory.add_base_concept("h_line", h.fsms, h_mat);
        memory.add_base_concept("v_line", v.fsms, v_mat);
        memory
    }

    fn add_square(memory: &mut ConceptMemory, name: &str) {
        let mat = hollow_square();
        let hoa = HoaLearner::new(memory.store()).learn(name, &mat).unwrap();
        memory.add_hoa_concept(name, hoa, mat);
    }

    #[test]
    fn test_add_extends_automaton_list() {
        let mut memory = memory_with_lines();
        let h = learn_simple_concept(&SymbolMatrix::from_lines(&["xxxx"])).unwrap();
        memory.add_base_concept("h_line", h.fsms, SymbolMatrix::from_lines(&["xxxx"]));
        assert_eq!(memory.store().automata("h_line").len(), 4);
        assert_eq!(memory.patterns("h_line").len(), 2);
    }

    #[test]
    fn test_dependency_net_tracks_constituents() {
        let mut memory = memory_with_lines();
        add_square(&mut memory, "square");
        let edges = memory.dependency_edges();
        assert!(edges.contains(&("square".to_string(), "h_line".to_string())));
        assert!(edges.contains(&("square".to_string(), "v_line".to_string())));
    }

    #[test]
    fn test_retrieval_finds_square() {
        let mut memory = memory_with_lines();
        add_square(&mut memory, "square");
        let satisfied = memory.retrieve_satisfiable_hoa_concepts(&hollow_square());
        assert_eq!(satisfied.len(), 1);
        assert_eq!(satisfied[0].0, "square");
    }

    #[test]
    fn test_partial_activation_recorded_for_near_miss() {
        let mut memory = memory_with_lines();
        add_square(&mut memory, "square");
        // Three sides only.
        let broken = SymbolMatrix::from_lines(&["xxx", "x x", "x x"]);
        let satisfied = memory.retrieve_satisfiable_hoa_concepts(&broken);
        assert!(satisfied.is_empty());
        let partials = memory.partial_activations();
        assert_eq!(partials.len(), 1);
        assert!(partials[0].score > 0.0 && partials[0].score < 1.0);
    }

    #[test]
    fn test_basic_retrieval() {
        let memory = memory_with_lines();
        let satisfied =
            memory.retrieve_satisfiable_basic_concepts(&SymbolMatrix::from_lines(&["xxxxx"]));
        assert!(satisfied.iter().any(|(name, _)| name == "h_line"));
        assert!(satisfied.iter().all(|(name, _)| name != "v_line"));
    }

    #[test]
    fn test_unknown_ids_and_promotion() {
        let mut memory = memory_with_lines();
        let id = memory.unknown_concept_id(false);
        assert_eq!(id, "UNKNOWN-HOA-1");
        assert!(ConceptMemory::is_unsupervised_concept(&id));

        let mat = hollow_square();
        let hoa = HoaLearner::new(memory.store()).learn(&id, &mat).unwrap();
        memory.add_hoa_concept(&id, hoa, mat.clone());

        memory.reconfigure_unsupervised_concept(&id, "square", Some(mat));
        assert!(memory.has_concept("square"));
        assert!(!memory.has_concept(&id));
        assert_eq!(memory.patterns("square").len(), 2);
        let edges = memory.dependency_edges();
        assert!(edges.contains(&("square".to_string(), "h_line".to_string())));
    }

    #[test]
    fn test_removal_cascades_to_dependents() {
        let mut memory = memory_with_lines();
        add_square(&mut memory, "square");
        // A concept built on top of the square.
        let mat = hollow_square();
        let box_hoa = HoaLearner::new(memory.store()).learn("box", &mat).unwrap();
        memory.add_hoa_concept("box", box_hoa, mat);

        let affected = memory.remove_concept("h_line");
        let names: Vec<&str> = affected.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["box", "square"]);
        assert!(!memory.has_concept("h_line"));
        assert!(!memory.has_concept("square"));
        assert!(!memory.has_concept("box"));
        assert!(memory.has_concept("v_line"));
    }

    #[test]
    fn test_similarity_recorded_between_squares() {
        let mut memory = memory_with_lines();
        add_square(&mut memory, "square_a");
        // Keep the second square from decomposing into the first.
        let mat = hollow_square();
        let excluded = BTreeSet::from(["square_a".to_string()]);
        let hoa = HoaLearner::with_excluded(memory.store(), excluded)
            .learn("square_b", &mat)
            .unwrap();
        memory.add_hoa_concept("square_b", hoa, mat);

        let edges = memory.similarity_edges();
        assert_eq!(edges.len(), 1);
        assert!((edges[0].2 - 1.0).abs() < 1e-9);
    }
}
