//! # mosaic-hoa
//!
//! Layer 2: higher-order automata over the FSM layer.
//!
//! This crate provides:
//! - The HOA model: dependency graphs of constituent automata with
//!   positional moves and link constraints
//! - The automaton store: arena ownership of all learned FSMs and HOAs
//! - The HOA recognition kernel and partial-activation scoring
//! - The HOA learner: decomposition of complex patterns into activations
//!   of known automata
//! - Complexity and similarity comparators between automata
//!
//! Key invariants:
//! - An HOA learned from a pattern recognizes that pattern at its entry
//!   constituent's start coordinate with full coverage
//! - HOA nodes reference store automata by id; nesting is acyclic because
//!   constituents always predate the automata composed from them

pub mod compare;
pub mod kernel;
pub mod learner;
pub mod model;
pub mod store;

pub use compare::{compare_complexity, ConceptRelation, HoaComparator, HoaComparison};
pub use kernel::HoaRecognizer;
pub use learner::{HoaLearnError, HoaLearner};
pub use model::{Hoa, HoaEdge, HoaNode, LinkConstraint, MoveType};
pub use store::{apply_automaton, AutomatonRef, AutomatonStore, FsmId, HoaId};
