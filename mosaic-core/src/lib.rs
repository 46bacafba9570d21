//! # mosaic-core
//!
//! Layer 1: grid geometry, symbol matrices and FSM-based pattern
//! recognition.
//!
//! This crate provides:
//! - Moore-neighborhood grid geometry (moves, coordinates)
//! - Symbol matrices and the pattern/scene text format
//! - Pattern graphs with DFS decomposition into linear threads
//! - FSM learning from pattern graphs and the FSM recognition kernel
//! - Scene object segmentation (connected components)
//!
//! Key invariants:
//! - A pattern is "simple" iff its pattern graph is connected and has at
//!   least one start node (in-degree exactly 1)
//! - An FSM learned from a simple pattern recognizes that pattern at its
//!   own start coordinate with full coverage

pub mod fsm;
pub mod grid;
pub mod matrix;
pub mod pattern_graph;
pub mod scene;

pub use fsm::{
    learn_simple_concept, isomorphic_concepts, Activation, Fsm, FsmInput, FsmLearner,
    FsmRecognizer, FsmState, FsmSymbol, SimpleConcept, StateId,
};
pub use grid::{Coord, Direction};
pub use matrix::SymbolMatrix;
pub use pattern_graph::{DfsDecomposition, PatternGraph};
pub use scene::identify_objects;

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Structural failures of pattern learning.
///
/// These are expected outcomes of the learning pipeline (a pattern that is
/// not simple is learned as a complex concept instead), not program faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("pattern matrix has no non-blank cells")]
    EmptyPattern,
    #[error("pattern graph is not connected")]
    Disconnected,
    #[error("pattern graph has no start nodes")]
    NoStartNodes,
}

/// Result type for structural operations.
pub type StructureResult<T> = Result<T, StructureError>;
