//! The automaton store: arena ownership of all learned automata.
//!
//! FSMs and HOAs live in two append-only arenas and are referred to by
//! copyable ids. Concepts map names to the list of automata recognizing
//! them; a concept is *base* when its automata are FSMs and *higher-order*
//! when they are HOAs. HOA nodes hold [`AutomatonRef`]s into the same
//! store, so nesting never requires ownership cycles.

use mosaic_core::{Activation, Coord, Fsm, FsmRecognizer, SymbolMatrix};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::kernel::HoaRecognizer;
use crate::model::Hoa;

// ============================================================================
// Ids
// ============================================================================

/// Arena index of an FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FsmId(pub usize);

/// Arena index of a higher-order automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HoaId(pub usize);

/// A reference to any stored automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AutomatonRef {
    Fsm(FsmId),
    Hoa(HoaId),
}

impl AutomatonRef {
    pub fn is_base(self) -> bool {
        matches!(self, AutomatonRef::Fsm(_))
    }
}

// ============================================================================
// Store
// ============================================================================

/// Arena of all learned automata, indexed by concept name.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AutomatonStore {
    fsms: Vec<Fsm>,
    hoas: Vec<Hoa>,
    concepts: BTreeMap<String, Vec<AutomatonRef>>,
    base_concepts: BTreeSet<String>,
    hoa_concepts: BTreeSet<String>,
}

impl AutomatonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register base FSMs for a concept, extending any existing list.
    pub fn add_fsms(&mut self, concept: &str, fsms: Vec<Fsm>) -> Vec<AutomatonRef> {
        let refs: Vec<AutomatonRef> = fsms
            .into_iter()
            .map(|fsm| {
                let id = FsmId(self.fsms.len());
                self.fsms.push(fsm);
                AutomatonRef::Fsm(id)
            })
            .collect();
        self.concepts
            .entry(concept.to_string())
            .or_default()
            .extend(refs.iter().copied());
        self.base_concepts.insert(concept.to_string());
        refs
    }

    /// Register a higher-order automaton for a concept.
    pub fn add_hoa(&mut self, concept: &str, hoa: Hoa) -> AutomatonRef {
        let id = HoaId(self.hoas.len());
        self.hoas.push(hoa);
        let aref = AutomatonRef::Hoa(id);
        self.concepts
            .entry(concept.to_string())
            .or_default()
            .push(aref);
        self.hoa_concepts.insert(concept.to_string());
        aref
    }

    pub fn fsm(&self, id: FsmId) -> &Fsm {
        &self.fsms[id.0]
    }

    pub fn hoa(&self, id: HoaId) -> &Hoa {
        &self.hoas[id.0]
    }

    /// The automata of a concept. An unknown name is reported and yields
    /// an empty list rather than a panic.
    pub fn automata(&self, concept: &str) -> &[AutomatonRef] {
        match self.concepts.get(concept) {
            Some(refs) => refs,
            None => {
                warn!(concept, "lookup of unknown concept");
                &[]
            }
        }
    }

    pub fn has_concept(&self, concept: &str) -> bool {
        self.concepts.contains_key(concept)
    }

    pub fn is_base_concept(&self, concept: &str) -> bool {
        self.base_concepts.contains(concept)
    }

    /// Names of concepts recognized by base FSMs, in name order.
    pub fn base_concepts(&self) -> &BTreeSet<String> {
        &self.base_concepts
    }

    /// Names of concepts recognized by HOAs, in name order.
    pub fn hoa_concepts(&self) -> &BTreeSet<String> {
        &self.hoa_concepts
    }

    pub fn concept_names(&self) -> impl Iterator<Item = &String> {
        self.concepts.keys()
    }

    /// Rename a concept, rewriting every reference to the old name: the
    /// concept map, the base/HOA name sets, the renamed HOAs themselves
    /// and the constituent references inside every other stored HOA.
    pub fn rename_concept(&mut self, old: &str, new: &str) {
        if let Some(refs) = self.concepts.remove(old) {
            self.concepts
                .entry(new.to_string())
                .or_default()
                .extend(refs);
        }
        if self.base_concepts.remove(old) {
            self.base_concepts.insert(new.to_string());
        }
        if self.hoa_concepts.remove(old) {
            self.hoa_concepts.insert(new.to_string());
        }
        for hoa in &mut self.hoas {
            if hoa.concept == old {
                hoa.concept = new.to_string();
            }
            for node in hoa.graph.node_weights_mut() {
                if node.concept == old {
                    node.concept = new.to_string();
                }
            }
        }
    }

    /// Unregister a concept. Arena slots stay in place so that ids held
    /// by other automata never dangle; only the name mapping is dropped.
    pub fn remove_concept(&mut self, concept: &str) {
        self.concepts.remove(concept);
        self.base_concepts.remove(concept);
        self.hoa_concepts.remove(concept);
    }

    /// Concepts whose HOAs directly reference `concept` as a constituent.
    pub fn direct_dependents(&self, concept: &str) -> BTreeSet<String> {
        let mut dependents = BTreeSet::new();
        for name in &self.hoa_concepts {
            for aref in self.automata(name) {
                if let AutomatonRef::Hoa(id) = aref {
                    let hoa = self.hoa(*id);
                    if hoa.graph.node_weights().any(|n| n.concept == concept) {
                        dependents.insert(name.clone());
                    }
                }
            }
        }
        dependents
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Apply any stored automaton against a matrix at a start coordinate.
pub fn apply_automaton(
    store: &AutomatonStore,
    aref: AutomatonRef,
    matrix: &SymbolMatrix,
    start: Coord,
) -> Option<Activation> {
    match aref {
        AutomatonRef::Fsm(id) => FsmRecognizer::apply(store.fsm(id), matrix, start),
        AutomatonRef::Hoa(id) => HoaRecognizer::apply(store, store.hoa(id), matrix, start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::learn_simple_concept;
    use mosaic_core::SymbolMatrix;

    fn store_with_line() -> AutomatonStore {
        let mut store = AutomatonStore::new();
        let concept = learn_simple_concept(&SymbolMatrix::from_lines(&["xxx"])).unwrap();
        store.add_fsms("h_line", concept.fsms);
        store
    }

    #[test]
    fn test_add_and_lookup() {
        let store = store_with_line();
        assert_eq!(store.automata("h_line").len(), 2);
        assert!(store.is_base_concept("h_line"));
        assert!(store.automata("missing").is_empty());
    }

    #[test]
    fn test_dispatch_applies_fsm() {
        let store = store_with_line();
        let mat = SymbolMatrix::from_lines(&["xxxx"]);
        let act = apply_automaton(&store, store.automata("h_line")[0], &mat, Coord::new(0, 0))
            .expect("line generalizes");
        assert_eq!(act.time, 4);
    }

    #[test]
    fn test_rename_rewrites_constituents() {
        let mut store = store_with_line();
        let mut hoa = Hoa::new("pair");
        hoa.graph.add_node(crate::model::HoaNode {
            id: 0,
            automaton: store.automata("h_line")[0],
            concept: "h_line".to_string(),
            activation_time: 3,
        });
        store.add_hoa("pair", hoa);

        store.rename_concept("h_line", "horizontal");
        assert!(store.automata("horizontal").len() == 2);
        assert!(!store.has_concept("h_line"));
        let AutomatonRef::Hoa(id) = store.automata("pair")[0] else {
            panic!("expected HOA");
        };
        assert_eq!(store.hoa(id).graph[store.hoa(id).entry()].concept, "horizontal");
    }

    #[test]
    fn test_direct_dependents() {
        let mut store = store_with_line();
        let mut hoa = Hoa::new("pair");
        hoa.graph.add_node(crate::model::HoaNode {
            id: 0,
            automaton: store.automata("h_line")[0],
            concept: "h_line".to_string(),
            activation_time: 3,
        });
        store.add_hoa("pair", hoa);
        assert_eq!(
            store.direct_dependents("h_line"),
            BTreeSet::from(["pair".to_string()])
        );
        assert!(store.direct_dependents("pair").is_empty());
    }
}
