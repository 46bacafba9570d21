//! # mosaic-engine
//!
//! Layer 4: learning orchestration over concept memory.
//!
//! This crate provides:
//! - Complex-concept learning into memory ([`learn_complex_concept`])
//! - [`BaseLearner`]: learn a pattern as a higher-order concept, falling
//!   back to a base FSM concept when it is simple
//! - [`SupervisedLearner`]: learn a named concept, promoting a matching
//!   unsupervised concept instead of relearning it
//! - [`UnsupervisedLearner`]: segment a scene and learn each unknown
//!   object under a generated name
//! - [`AdvancedLearner`]: fragment patterns whose constituents are not
//!   yet in memory, learn the fragments, then compose
//! - Scene recognition and cascading concept removal with relearning
//!
//! Key invariants:
//! - Memory is only extended after learning succeeds; a failed learn
//!   leaves memory untouched
//! - A supervised name never overwrites existing automata; re-teaching a
//!   known concept extends its automaton list

use mosaic_core::{learn_simple_concept, identify_objects, Activation, StructureError, SymbolMatrix};
use mosaic_core::pattern_graph::PatternGraph;
use mosaic_hoa::{apply_automaton, AutomatonRef, HoaLearnError, HoaLearner};
use mosaic_memory::ConceptMemory;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Error Types
// ============================================================================

/// Why a pattern could not be learned at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("pattern not learnable as a composition ({hoa}) nor as a base concept ({base})")]
    Unlearnable {
        hoa: HoaLearnError,
        base: StructureError,
    },
    #[error("pattern could not be composed from its fragments: {0}")]
    Uncomposable(#[from] HoaLearnError),
}

pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Complex Concepts
// ============================================================================

/// Learn `matrix` as the higher-order concept `concept`, ignoring the
/// `excluded` concepts as constituents. Memory is extended only on
/// success.
pub fn learn_complex_concept(
    concept: &str,
    matrix: &SymbolMatrix,
    memory: &mut ConceptMemory,
    excluded: &BTreeSet<String>,
) -> Result<(), HoaLearnError> {
    let hoa = HoaLearner::with_excluded(memory.store(), excluded.clone())
        .learn(concept, matrix)?;
    memory.add_hoa_concept(concept, hoa, matrix.clone());
    Ok(())
}

// ============================================================================
// Concept Checking
// ============================================================================

/// Which family of automata recognized a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptKind {
    Base,
    HigherOrder,
}

/// A successful memory lookup for a pattern.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub kind: ConceptKind,
    /// Concepts whose automata recognized the pattern with full coverage.
    pub concepts: Vec<(String, AutomatonRef)>,
}

/// Look a pattern up in memory: higher-order concepts first, base
/// concepts as fallback. `None` means the pattern is unknown.
pub fn check_concept(matrix: &SymbolMatrix, memory: &mut ConceptMemory) -> Option<CheckOutcome> {
    let hoa = memory.retrieve_satisfiable_hoa_concepts(matrix);
    if !hoa.is_empty() {
        return Some(CheckOutcome {
            kind: ConceptKind::HigherOrder,
            concepts: hoa,
        });
    }
    let base = memory.retrieve_satisfiable_basic_concepts(matrix);
    if !base.is_empty() {
        return Some(CheckOutcome {
            kind: ConceptKind::Base,
            concepts: base,
        });
    }
    None
}

// ============================================================================
// Base Learner
// ============================================================================

/// Learns one pattern into memory, choosing the concept family.
pub struct BaseLearner;

impl BaseLearner {
    /// Learn `matrix` under `name`, or under a generated `UNKNOWN-*` name
    /// when `name` is `None`. Composition over known concepts is tried
    /// first; a simple pattern falls back to a base FSM concept. Returns
    /// the name the concept was stored under.
    pub fn learn_concept(
        memory: &mut ConceptMemory,
        name: Option<&str>,
        matrix: &SymbolMatrix,
    ) -> EngineResult<String> {
        let complex_name = match name {
            Some(n) => n.to_string(),
            None => memory.unknown_concept_id(false),
        };
        let hoa_err = match learn_complex_concept(&complex_name, matrix, memory, &BTreeSet::new())
        {
            Ok(()) => {
                info!(concept = %complex_name, "learned as higher-order concept");
                return Ok(complex_name);
            }
            Err(err) => err,
        };
        debug!(concept = %complex_name, %hoa_err, "not learnable as composition");

        match learn_simple_concept(matrix) {
            Ok(simple) => {
                let base_name = match name {
                    Some(n) => n.to_string(),
                    None => memory.unknown_concept_id(true),
                };
                info!(concept = %base_name, "learned as base concept");
                memory.add_base_concept(&base_name, simple.fsms, matrix.clone());
                Ok(base_name)
            }
            Err(base) => Err(EngineError::Unlearnable { hoa: hoa_err, base }),
        }
    }
}

// ============================================================================
// Supervised Learner
// ============================================================================

/// Learns labeled patterns.
pub struct SupervisedLearner;

impl SupervisedLearner {
    /// Learn `matrix` as `name`. If memory already recognizes the pattern
    /// under an unsupervised name, that concept is promoted to `name`
    /// instead of being relearned; if it is recognized under a supervised
    /// name, that name is returned unchanged.
    pub fn learn(
        memory: &mut ConceptMemory,
        name: &str,
        matrix: &SymbolMatrix,
    ) -> EngineResult<String> {
        if let Some(outcome) = check_concept(matrix, memory) {
            let unsupervised = outcome
                .concepts
                .iter()
                .map(|(n, _)| n.clone())
                .find(|n| ConceptMemory::is_unsupervised_concept(n));
            if let Some(old) = unsupervised {
                memory.reconfigure_unsupervised_concept(&old, name, Some(matrix.clone()));
                return Ok(name.to_string());
            }
            let (known, _) = &outcome.concepts[0];
            info!(concept = %known, "pattern already known");
            return Ok(known.clone());
        }
        BaseLearner::learn_concept(memory, Some(name), matrix)
    }
}

// ============================================================================
// Unsupervised Learner
// ============================================================================

/// Learns scenes without labels.
pub struct UnsupervisedLearner;

impl UnsupervisedLearner {
    /// Segment `scene` into objects and learn each unknown one under a
    /// generated name. Returns, per object in read order, the concept it
    /// was recognized as or stored under; `None` for unlearnable objects.
    pub fn learn_scene(memory: &mut ConceptMemory, scene: &SymbolMatrix) -> Vec<Option<String>> {
        identify_objects(scene)
            .iter()
            .map(|object| {
                if let Some(outcome) = check_concept(object, memory) {
                    return Some(outcome.concepts[0].0.clone());
                }
                match BaseLearner::learn_concept(memory, None, object) {
                    Ok(name) => Some(name),
                    Err(err) => {
                        warn!(%err, "scene object not learnable");
                        None
                    }
                }
            })
            .collect()
    }
}

// ============================================================================
// Advanced Learner
// ============================================================================

/// Learns patterns whose constituents are not yet in memory by
/// fragmenting them first.
pub struct AdvancedLearner;

impl AdvancedLearner {
    /// Learn `matrix` as `name` by pixel removal: blank the first pixel,
    /// then repeatedly blank the highest-degree pixel until the remainder
    /// splits into linear fragments. Unknown fragments are learned under
    /// generated names, then the full pattern is composed from them.
    pub fn learn(
        memory: &mut ConceptMemory,
        name: &str,
        matrix: &SymbolMatrix,
    ) -> EngineResult<String> {
        let mut working = matrix.clone();
        if let Some(first) = working.non_blank().first().copied() {
            working.set(first, mosaic_core::matrix::BLANK);
        }

        let fragments = loop {
            let fragments = identify_objects(&working);
            if !fragments.is_empty() && fragments.iter().all(Self::is_linear_fragment) {
                break fragments;
            }
            let graph = PatternGraph::build(&working);
            // First strict maximum in read order.
            let mut busiest = None;
            for n in graph.node_indices() {
                let degree = graph.degree(n);
                if busiest.map_or(true, |(_, d)| degree > d) {
                    busiest = Some((graph.coord(n), degree));
                }
            }
            match busiest.map(|(coord, _)| coord) {
                Some(coord) => working.set(coord, mosaic_core::matrix::BLANK),
                // Everything was blanked without reaching linear
                // fragments; composition below decides the outcome.
                None => break Vec::new(),
            }
        };

        for fragment in &fragments {
            if check_concept(fragment, memory).is_some() {
                continue;
            }
            if let Err(err) = BaseLearner::learn_concept(memory, None, fragment) {
                warn!(%err, "fragment not learnable");
            }
        }

        learn_complex_concept(name, matrix, memory, &BTreeSet::new())?;
        Ok(name.to_string())
    }

    /// A fragment every FSM can traverse: simple, with no pixel adjacent
    /// to more than two others.
    fn is_linear_fragment(fragment: &SymbolMatrix) -> bool {
        let graph = PatternGraph::build(fragment);
        graph.check_simple().is_ok()
            && graph.node_indices().all(|n| graph.in_degree(n) <= 2)
    }
}

// ============================================================================
// Scene Recognition
// ============================================================================

/// One recognized (or unrecognized) scene object.
#[derive(Debug, Clone)]
pub struct SceneRecognition {
    pub object: SymbolMatrix,
    pub concept: Option<String>,
    /// The covering activation of the recognizing automaton.
    pub activation: Option<Activation>,
}

/// Recognize every object of a scene against memory, in read order.
pub fn recognize_scene(memory: &mut ConceptMemory, scene: &SymbolMatrix) -> Vec<SceneRecognition> {
    identify_objects(scene)
        .into_iter()
        .map(|object| {
            let matched = check_concept(&object, memory)
                .map(|o| o.concepts[0].clone())
                .map(|(concept, aref)| {
                    let activation = covering_activation(memory, aref, &object);
                    (concept, activation)
                });
            match matched {
                Some((concept, activation)) => SceneRecognition {
                    object,
                    concept: Some(concept),
                    activation,
                },
                None => SceneRecognition {
                    object,
                    concept: None,
                    activation: None,
                },
            }
        })
        .collect()
}

/// Re-apply a recognizing automaton to recover its covering activation.
fn covering_activation(
    memory: &ConceptMemory,
    aref: AutomatonRef,
    object: &SymbolMatrix,
) -> Option<Activation> {
    for start in object.non_blank() {
        if let Some(act) = apply_automaton(memory.store(), aref, object, start) {
            let fields: BTreeSet<_> = act.visited.iter().copied().collect();
            if object.covered_by(&fields) {
                return Some(act);
            }
        }
    }
    None
}

// ============================================================================
// Removal and Relearning
// ============================================================================

/// Remove a concept, then relearn its cascading dependents from their
/// recorded patterns without the removed concept. Dependents are retried
/// until a pass makes no progress, so relearn order follows the
/// dependency chain. Returns the successfully relearned names.
pub fn remove_concept_and_relearn(memory: &mut ConceptMemory, concept: &str) -> Vec<String> {
    let mut pending = memory.remove_concept(concept);
    let excluded = BTreeSet::from([concept.to_string()]);
    let mut relearned = Vec::new();

    loop {
        let mut progressed = false;
        let mut still_pending = Vec::new();
        for (name, pattern) in pending {
            if relearn_one(memory, &name, &pattern, &excluded) {
                relearned.push(name);
                progressed = true;
            } else {
                still_pending.push((name, pattern));
            }
        }
        pending = still_pending;
        if pending.is_empty() || !progressed {
            break;
        }
    }
    for (name, _) in &pending {
        warn!(concept = %name, "dependent concept lost; not relearnable");
    }
    relearned
}

fn relearn_one(
    memory: &mut ConceptMemory,
    name: &str,
    pattern: &SymbolMatrix,
    excluded: &BTreeSet<String>,
) -> bool {
    if learn_complex_concept(name, pattern, memory, excluded).is_ok() {
        return true;
    }
    match learn_simple_concept(pattern) {
        Ok(simple) => {
            memory.add_base_concept(name, simple.fsms, pattern.clone());
            true
        }
        Err(_) => false,
    }
}

// ============================================================================
// Learning Engine
// ============================================================================

/// One unit of teaching input.
#[derive(Debug, Clone)]
pub enum LearningInput {
    /// A labeled pattern.
    Labeled { name: String, pattern: SymbolMatrix },
    /// An unlabeled scene of objects.
    Scene { matrix: SymbolMatrix },
}

/// The learning engine: concept memory plus the learners over it.
#[derive(Debug, Default)]
pub struct LearningEngine {
    memory: ConceptMemory,
}

impl LearningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &ConceptMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut ConceptMemory {
        &mut self.memory
    }

    /// Process one teaching input, returning the concept names involved.
    pub fn learn(&mut self, input: LearningInput) -> EngineResult<Vec<String>> {
        match input {
            LearningInput::Labeled { name, pattern } => {
                SupervisedLearner::learn(&mut self.memory, &name, &pattern).map(|n| vec![n])
            }
            LearningInput::Scene { matrix } => Ok(UnsupervisedLearner::learn_scene(
                &mut self.memory,
                &matrix,
            )
            .into_iter()
            .flatten()
            .collect()),
        }
    }

    /// Recognize every object of a scene.
    pub fn recognize(&mut self, scene: &SymbolMatrix) -> Vec<SceneRecognition> {
        recognize_scene(&mut self.memory, scene)
    }

    /// Remove a concept and relearn its dependents.
    pub fn forget(&mut self, concept: &str) -> Vec<String> {
        remove_concept_and_relearn(&mut self.memory, concept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hollow_square() -> SymbolMatrix {
        SymbolMatrix::from_lines(&["xxx", "x x", "xxx"])
    }

    fn teach_lines(memory: &mut ConceptMemory) {
        SupervisedLearner::learn(memory, "h_line", &SymbolMatrix::from_lines(&["xxx"])).unwrap();
        SupervisedLearner::learn(
            memory,
            "v_line",
            &SymbolMatrix::from_lines(&["x", "x", "x"]),
        )
        .unwrap();
    }

    #[test]
    fn test_simple_pattern_becomes_base_concept() {
        let mut memory = ConceptMemory::new();
        let name =
            SupervisedLearner::learn(&mut memory, "h_line", &SymbolMatrix::from_lines(&["xxx"]))
                .unwrap();
        assert_eq!(name, "h_line");
        assert!(memory.store().is_base_concept("h_line"));
    }

    #[test]
    fn test_square_becomes_higher_order_concept() {
        let mut memory = ConceptMemory::new();
        teach_lines(&mut memory);
        let name = SupervisedLearner::learn(&mut memory, "square", &hollow_square()).unwrap();
        assert_eq!(name, "square");
        assert!(memory.store().hoa_concepts().contains("square"));
    }

    #[test]
    fn test_unlearnable_pattern_reports_both_failures() {
        let mut memory = ConceptMemory::new();
        // Disconnected and not coverable by anything known.
        let err = SupervisedLearner::learn(
            &mut memory,
            "ghost",
            &SymbolMatrix::from_lines(&["x x"]),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Unlearnable { .. }));
        assert!(!memory.has_concept("ghost"));
    }

    #[test]
    fn test_reteaching_known_pattern_does_not_relearn() {
        let mut memory = ConceptMemory::new();
        teach_lines(&mut memory);
        let name =
            SupervisedLearner::learn(&mut memory, "stripe", &SymbolMatrix::from_lines(&["xxx"]))
                .unwrap();
        // The pattern is already known as h_line.
        assert_eq!(name, "h_line");
        assert!(!memory.has_concept("stripe"));
    }

    #[test]
    fn test_unsupervised_then_promotion() {
        let mut memory = ConceptMemory::new();
        teach_lines(&mut memory);
        let scene = SymbolMatrix::from_lines(&[
            "xxx    ",
            "x x    ",
            "xxx    ",
        ]);
        let learned = UnsupervisedLearner::learn_scene(&mut memory, &scene);
        assert_eq!(learned.len(), 1);
        let unknown = learned[0].clone().unwrap();
        assert!(ConceptMemory::is_unsupervised_concept(&unknown));

        // Teaching the same shape under a real name promotes it.
        let name = SupervisedLearner::learn(&mut memory, "square", &hollow_square()).unwrap();
        assert_eq!(name, "square");
        assert!(!memory.has_concept(&unknown));
        assert!(memory.has_concept("square"));
    }

    #[test]
    fn test_advanced_learner_fragments_block() {
        let mut memory = ConceptMemory::new();
        let block = SymbolMatrix::from_lines(&["xx", "xx"]);
        let name = AdvancedLearner::learn(&mut memory, "block", &block).unwrap();
        assert_eq!(name, "block");
        assert!(memory.store().hoa_concepts().contains("block"));
        // The fragment was learned under a generated base name. Blanking
        // the first of the equally-busy pixels leaves the bottom row, so
        // the fragment recognizes a horizontal pair.
        let fragment = memory
            .store()
            .base_concepts()
            .iter()
            .find(|n| ConceptMemory::is_unsupervised_concept(n))
            .cloned()
            .expect("fragment stored under a generated name");
        let pair = SymbolMatrix::from_lines(&["xx"]);
        assert!(apply_automaton(
            memory.store(),
            memory.store().automata(&fragment)[0],
            &pair,
            mosaic_core::Coord::new(0, 0),
        )
        .is_some());
    }

    #[test]
    fn test_scene_recognition() {
        let mut memory = ConceptMemory::new();
        teach_lines(&mut memory);
        SupervisedLearner::learn(&mut memory, "square", &hollow_square()).unwrap();

        let scene = SymbolMatrix::from_lines(&[
            "xxx      ",
            "x x   xxx",
            "xxx      ",
        ]);
        let recognized = recognize_scene(&mut memory, &scene);
        assert_eq!(recognized.len(), 2);
        assert_eq!(recognized[0].concept.as_deref(), Some("square"));
        assert_eq!(recognized[1].concept.as_deref(), Some("h_line"));
        let act = recognized[0].activation.as_ref().unwrap();
        assert_eq!(act.time, act.visited.len());
        let fields: BTreeSet<_> = act.visited.iter().copied().collect();
        assert!(recognized[0].object.covered_by(&fields));
    }

    #[test]
    fn test_forget_relearns_dependents() {
        let mut memory = ConceptMemory::new();
        teach_lines(&mut memory);
        SupervisedLearner::learn(&mut memory, "square", &hollow_square()).unwrap();
        // A concept composed of the square alone.
        learn_complex_concept("box", &hollow_square(), &mut memory, &BTreeSet::new()).unwrap();

        let relearned = remove_concept_and_relearn(&mut memory, "square");
        assert_eq!(relearned, vec!["box".to_string()]);
        assert!(!memory.has_concept("square"));
        // The box now decomposes into lines directly.
        assert!(memory.has_concept("box"));
    }
}
