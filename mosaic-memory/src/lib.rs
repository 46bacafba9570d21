//! # mosaic-memory
//!
//! Layer 3: long-term concept memory.
//!
//! This crate provides:
//! - [`ConceptMemory`]: automata, example patterns and generated names
//!   for every learned concept
//! - Relationship nets between concepts: inheritance, dependency and
//!   weighted similarity
//! - Retrieval of satisfiable concepts for a pattern, with
//!   partial-activation scoring of near-misses
//! - Cascading concept removal that reports affected dependents
//! - The big-graph JSON export of everything memory knows
//!
//! Key invariants:
//! - Adding an existing concept extends its automaton list; it never
//!   replaces previously learned automata
//! - The dependency net always contains an edge for every constituent of
//!   every stored higher-order automaton

pub mod big_graph;
pub mod memory;
pub mod relations;

pub use big_graph::{BigEdge, BigNode, BigNodeKind, MemoryGraph};
pub use memory::{
    ConceptMemory, PartialActivation, UNKNOWN_FSM_PREFIX, UNKNOWN_HOA_PREFIX,
};
pub use relations::{RelationGraph, SimilarityGraph};
