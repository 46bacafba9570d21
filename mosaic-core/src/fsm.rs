//! Finite-state machines: model, learner and recognition kernel.
//!
//! An FSM recognizes one simple connected pattern. It is learned from a
//! single DFS decomposition of the pattern graph and traversed
//! deterministically against an input matrix. States are arena-indexed by
//! [`StateId`]; transitions carry either a grid move with the expected
//! symbol at the target cell, or the EMPTY sentinel used to return to a
//! branch point after a side thread is exhausted.

use crate::grid::{Coord, Direction};
use crate::matrix::SymbolMatrix;
use crate::pattern_graph::{DfsDecomposition, PatternGraph};
use crate::StructureResult;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Index of a state within its FSM.
pub type StateId = usize;

// ============================================================================
// Model
// ============================================================================

/// A grid-move transition symbol: the move and the symbol expected at the
/// target cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmSymbol {
    pub direction: Direction,
    pub next_symbol: char,
}

impl fmt::Display for FsmSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{}>", self.direction, self.next_symbol)
    }
}

/// A transition input: a grid move or the epsilon sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsmInput {
    Step(FsmSymbol),
    Empty,
}

impl fmt::Display for FsmInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsmInput::Step(sym) => sym.fmt(f),
            FsmInput::Empty => f.write_str("<EMPTY,>"),
        }
    }
}

/// One FSM state with its ordered outgoing transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmState {
    pub name: String,
    pub transitions: Vec<(FsmInput, StateId)>,
}

/// A finite-state machine recognizing one simple pattern.
///
/// State 0 is the start state. Constructed once at learning time and
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fsm {
    pub activating_symbol: char,
    pub states: Vec<FsmState>,
}

impl Fsm {
    pub fn new(activating_symbol: char) -> Self {
        Self {
            activating_symbol,
            states: Vec::new(),
        }
    }

    /// Append a fresh state, returning its id.
    pub fn create_state(&mut self) -> StateId {
        let id = self.states.len();
        self.states.push(FsmState {
            name: format!("S_{id}"),
            transitions: Vec::new(),
        });
        id
    }

    pub fn add_transition(&mut self, from: StateId, input: FsmInput, to: StateId) {
        self.states[from].transitions.push((input, to));
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

// ============================================================================
// Learner
// ============================================================================

/// Learns an FSM from one DFS decomposition of a pattern graph.
pub struct FsmLearner<'a> {
    graph: &'a PatternGraph,
    start: NodeIndex,
    decomposition: DfsDecomposition,
}

impl<'a> FsmLearner<'a> {
    pub fn new(graph: &'a PatternGraph, start: NodeIndex) -> Self {
        let decomposition = graph.decompose(start);
        Self {
            graph,
            start,
            decomposition,
        }
    }

    /// Build the FSM: one thread of states per DFS sequence, threads
    /// joined at their branch points, EMPTY transitions linking each
    /// non-final thread end back to its attachment thread's end.
    pub fn learn(&self) -> Fsm {
        let mut fsm = Fsm::new(self.graph.symbol(self.start));
        let sequences = &self.decomposition.sequences;
        let mut start_states: Vec<StateId> = Vec::new();
        let mut end_states: Vec<StateId> = Vec::new();

        for (seq_index, seq) in sequences.iter().enumerate() {
            let symbols = self.symbol_sequence(seq);
            let (first, last) = self.build_thread(&mut fsm, &symbols);
            start_states.push(first);
            end_states.push(last);

            // Join this thread to the thread owning its branch point.
            if seq_index > 0 {
                let input = self.thread_entry_symbol(seq);
                if let Some(back) = self.decomposition.return_back[seq_index] {
                    fsm.add_transition(end_states[back], FsmInput::Step(input), first);
                }
            }
        }

        // EMPTY escapes: after a side thread is exhausted, recognition
        // returns to the end state of the thread it branched from.
        for seq_index in 1..sequences.len().saturating_sub(1) {
            if let Some(back) = self.decomposition.return_back[seq_index] {
                fsm.add_transition(end_states[seq_index], FsmInput::Empty, end_states[back]);
            }
        }

        fsm
    }

    /// States and transitions for one thread; returns (start, end) ids.
    fn build_thread(&self, fsm: &mut Fsm, symbols: &[FsmSymbol]) -> (StateId, StateId) {
        if symbols.is_empty() {
            // Singleton node: one state that both starts and ends the thread.
            let state = fsm.create_state();
            return (state, state);
        }

        let period = repetition_period(symbols);
        let local: Vec<StateId>;
        if period == 0 {
            let (reduced, repeated) = collapse_repetitions(symbols);
            local = (0..=reduced.len()).map(|_| fsm.create_state()).collect();
            for i in 0..local.len() - 1 {
                if i > 0 && repeated[i - 1] {
                    fsm.add_transition(local[i], FsmInput::Step(reduced[i - 1]), local[i]);
                }
                fsm.add_transition(local[i], FsmInput::Step(reduced[i]), local[i + 1]);
            }
            if *repeated.last().unwrap_or(&false) {
                let last = *local.last().unwrap();
                fsm.add_transition(last, FsmInput::Step(*reduced.last().unwrap()), last);
            }
        } else {
            // Periodic motif: a cycle of period+1 states accepts any number
            // of repetitions, not just the observed count.
            let motif = &symbols[..period];
            local = (0..=motif.len()).map(|_| fsm.create_state()).collect();
            for i in 0..local.len() - 1 {
                fsm.add_transition(local[i], FsmInput::Step(motif[i]), local[i + 1]);
            }
            fsm.add_transition(*local.last().unwrap(), FsmInput::Step(motif[0]), local[1]);
        }
        (local[0], *local.last().unwrap())
    }

    /// The (move, next-symbol) run along one coordinate sequence.
    fn symbol_sequence(&self, seq: &[NodeIndex]) -> Vec<FsmSymbol> {
        seq.windows(2)
            .filter_map(|w| {
                self.graph.direction(w[0], w[1]).map(|direction| FsmSymbol {
                    direction,
                    next_symbol: self.graph.symbol(w[1]),
                })
            })
            .collect()
    }

    /// The symbol that enters a thread from its DFS branch point.
    fn thread_entry_symbol(&self, seq: &[NodeIndex]) -> FsmSymbol {
        let start = seq[0];
        let prev = self.decomposition.parent[&start].expect("non-root thread has a parent");
        FsmSymbol {
            direction: self.graph.direction(prev, start).expect("parent is adjacent"),
            next_symbol: self.graph.symbol(start),
        }
    }
}

/// Smallest period `L` (2 ≤ L ≤ n/2) such that the sequence tiles exactly
/// with period `L`, or 0 when no such period exists.
///
/// A uniform run (`[a,a,a]`, `[a,a,a,a]`) is a pure repetition, not a
/// periodic motif: it reports 0 and is handled by self-loop collapse
/// instead, whatever its length.
pub fn repetition_period<T: PartialEq>(seq: &[T]) -> usize {
    let n = seq.len();
    if seq.windows(2).all(|w| w[0] == w[1]) {
        return 0;
    }
    for period in 2..=n / 2 {
        if n % period == 0 && seq.chunks(period).all(|chunk| chunk == &seq[..period]) {
            return period;
        }
    }
    0
}

/// Collapse maximal immediate repetitions; returns the reduced sequence
/// and, per element, whether it was a collapsed run (becomes a self-loop).
pub fn collapse_repetitions(seq: &[FsmSymbol]) -> (Vec<FsmSymbol>, Vec<bool>) {
    let mut reduced = Vec::new();
    let mut repeated = Vec::new();
    let mut i = 0;
    while i < seq.len() {
        let curr = seq[i];
        let run_end = seq[i..].iter().take_while(|&&s| s == curr).count();
        reduced.push(curr);
        repeated.push(run_end > 1);
        i += run_end;
    }
    (reduced, repeated)
}

// ============================================================================
// Recognition Kernel
// ============================================================================

/// A successful automaton application: the step count and the visited
/// coordinate sequence (last element anchors HOA composition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub time: usize,
    pub visited: Vec<Coord>,
}

impl Activation {
    pub fn start(&self) -> Option<Coord> {
        self.visited.first().copied()
    }

    pub fn end(&self) -> Option<Coord> {
        self.visited.last().copied()
    }

    /// Visited coordinates excluding first and last.
    pub fn interior(&self) -> &[Coord] {
        if self.visited.len() <= 2 {
            &[]
        } else {
            &self.visited[1..self.visited.len() - 1]
        }
    }
}

/// Applies an FSM against a matrix from a start coordinate.
pub struct FsmRecognizer<'a> {
    fsm: &'a Fsm,
    matrix: &'a SymbolMatrix,
    time: usize,
    visited: Vec<Coord>,
    activated: Vec<bool>,
}

impl<'a> FsmRecognizer<'a> {
    /// Apply `fsm` at `start`. `None` is a recognition miss, not an error.
    pub fn apply(fsm: &'a Fsm, matrix: &'a SymbolMatrix, start: Coord) -> Option<Activation> {
        if fsm.states.is_empty() || matrix.get(start)? != fsm.activating_symbol {
            return None;
        }
        let mut kernel = Self {
            fsm,
            matrix,
            time: 0,
            visited: Vec::new(),
            activated: vec![false; fsm.states.len()],
        };
        if kernel.apply_rec(0, start) {
            Some(Activation {
                time: kernel.time,
                visited: kernel.visited,
            })
        } else {
            None
        }
    }

    fn apply_rec(&mut self, mut state: StateId, mut pos: Coord) -> bool {
        loop {
            self.time += 1;
            self.visited.push(pos);
            self.activated[state] = true;

            let total = self.fsm.states[state].transitions.len();
            let (feasible, empty_present, selfloop_present) =
                self.feasible_transitions(state, pos);

            if feasible.is_empty() {
                return if empty_present {
                    // EMPTY is acceptable only when it is the sole escape.
                    total == 1 || (total == 2 && selfloop_present)
                } else {
                    // Natural termination: the automaton must have
                    // exercised its entire structure.
                    self.activated.iter().all(|&a| a)
                };
            }

            if !selfloop_present {
                // Without a self-loop every non-EMPTY transition must be
                // feasible, otherwise an ambiguity was silently dropped.
                let diff = usize::from(empty_present);
                if feasible.len() + diff != total {
                    return false;
                }
            }

            if feasible.len() == 1 {
                let (next_pos, next_state) = feasible[0];
                pos = next_pos;
                state = next_state;
            } else {
                // Graph fork: every branch must verify simultaneously.
                for (next_pos, next_state) in feasible {
                    if next_state != state && !self.apply_rec(next_state, next_pos) {
                        return false;
                    }
                }
                return true;
            }
        }
    }

    fn feasible_transitions(
        &self,
        state: StateId,
        pos: Coord,
    ) -> (Vec<(Coord, StateId)>, bool, bool) {
        let mut feasible = Vec::new();
        let mut empty_present = false;
        let mut selfloop_present = false;

        for &(input, target) in &self.fsm.states[state].transitions {
            match input {
                FsmInput::Step(sym) => {
                    if target == state {
                        selfloop_present = true;
                    }
                    let next = pos.step(sym.direction);
                    if self.matrix.get(next) == Some(sym.next_symbol) {
                        feasible.push((next, target));
                    }
                }
                FsmInput::Empty => empty_present = true,
            }
        }

        (feasible, empty_present, selfloop_present)
    }
}

// ============================================================================
// Simple-Concept Entry Point
// ============================================================================

/// A learned simple concept: the pattern graph plus one FSM per start node.
#[derive(Debug)]
pub struct SimpleConcept {
    pub graph: PatternGraph,
    pub fsms: Vec<Fsm>,
}

/// Learn a simple concept from a pattern matrix.
///
/// Fails with a [`crate::StructureError`] when the pattern is not simple;
/// callers escalate to complex-concept learning in that case.
pub fn learn_simple_concept(matrix: &SymbolMatrix) -> StructureResult<SimpleConcept> {
    let graph = PatternGraph::build(matrix);
    graph.check_simple()?;
    let fsms = graph
        .start_nodes()
        .to_vec()
        .into_iter()
        .map(|start| FsmLearner::new(&graph, start).learn())
        .collect();
    Ok(SimpleConcept { graph, fsms })
}

// ============================================================================
// Isomorphism
// ============================================================================

/// Positional FSM isomorphism: same state count, aligned transitions with
/// a consistent transition-symbol mapping.
pub fn isomorphic_fsms(a: &Fsm, b: &Fsm) -> bool {
    if a.states.len() != b.states.len() {
        return false;
    }
    let mut symbol_map: HashMap<String, String> = HashMap::new();
    for (sa, sb) in a.states.iter().zip(&b.states) {
        if sa.transitions.len() != sb.transitions.len() {
            return false;
        }
        for (&(ia, ta), &(ib, tb)) in sa.transitions.iter().zip(&sb.transitions) {
            if ta != tb {
                return false;
            }
            match (ia, ib) {
                (FsmInput::Empty, FsmInput::Empty) => {}
                (FsmInput::Empty, _) | (_, FsmInput::Empty) => return false,
                _ => {}
            }
            let (ka, kb) = (ia.to_string(), ib.to_string());
            match symbol_map.get(&ka) {
                Some(mapped) if *mapped != kb => return false,
                Some(_) => {}
                None => {
                    symbol_map.insert(ka, kb);
                }
            }
        }
    }
    true
}

/// Whether any automaton of one concept is isomorphic to any of another.
pub fn isomorphic_concepts(a_fsms: &[Fsm], b_fsms: &[Fsm]) -> bool {
    a_fsms
        .iter()
        .any(|a| b_fsms.iter().any(|b| isomorphic_fsms(a, b)))
}
