//! The HOA recognition kernel.
//!
//! Recognition walks the dependency graph in BFS order from the entry
//! node, activating each constituent automaton at the coordinate derived
//! from its predecessor's activation. After the walk, time and link
//! constraints are verified over the recorded activations. A partial walk
//! is not an error: it is kept and scored, so that near-misses can rank
//! candidate concepts during unsupervised learning.

use mosaic_core::{Activation, Coord, Direction, SymbolMatrix};
use std::collections::{BTreeSet, VecDeque};

use crate::model::{Hoa, LinkConstraint, MoveType};
use crate::store::{apply_automaton, AutomatonRef, AutomatonStore};

/// Weight of the activated-node fraction in the activation score.
const SCORE_NODES: f64 = 0.7;
/// Weight of the satisfied time-constraint fraction.
const SCORE_TIMES: f64 = 0.1;
/// Weight of the satisfied link-constraint fraction.
const SCORE_LINKS: f64 = 0.2;

/// Applies a higher-order automaton against a matrix.
pub struct HoaRecognizer;

impl HoaRecognizer {
    /// Apply `hoa` at `start`. Recognition succeeds only when every node
    /// activates and every time and link constraint holds; the returned
    /// activation concatenates all constituent visited runs in node-id
    /// order. `None` is a recognition miss, not an error.
    pub fn apply(
        store: &AutomatonStore,
        hoa: &Hoa,
        matrix: &SymbolMatrix,
        start: Coord,
    ) -> Option<Activation> {
        let activations = Self::run(store, hoa, matrix, start);
        if activations.iter().any(|a| a.is_none()) {
            return None;
        }
        let (time_sat, time_total) = Self::time_constraint_stats(hoa, &activations);
        if time_sat != time_total {
            return None;
        }
        let (link_sat, link_total) = Self::link_constraint_stats(hoa, &activations);
        if link_sat != link_total {
            return None;
        }

        // Concatenate in firing (node-id) order.
        let mut ordered: Vec<(usize, Activation)> = hoa
            .graph
            .node_indices()
            .filter_map(|n| activations[n.index()].clone().map(|a| (hoa.graph[n].id, a)))
            .collect();
        ordered.sort_by_key(|(id, _)| *id);
        let visited: Vec<Coord> = ordered
            .into_iter()
            .flat_map(|(_, a)| a.visited)
            .collect();
        Some(Activation {
            time: visited.len(),
            visited,
        })
    }

    /// Score a (possibly partial) application in `[0, 1]`: 0.7 weight on
    /// the fraction of nodes activated, 0.1 on satisfied time constraints
    /// and 0.2 on satisfied link constraints. A run that activates no
    /// node scores 0 regardless of constraint vacuity.
    pub fn activation_score(
        store: &AutomatonStore,
        hoa: &Hoa,
        matrix: &SymbolMatrix,
        start: Coord,
    ) -> f64 {
        let activations = Self::run(store, hoa, matrix, start);
        let activated = activations.iter().filter(|a| a.is_some()).count();
        if activated == 0 || hoa.node_count() == 0 {
            return 0.0;
        }
        let node_frac = activated as f64 / hoa.node_count() as f64;
        let (time_sat, time_total) = Self::time_constraint_stats(hoa, &activations);
        let (link_sat, link_total) = Self::link_constraint_stats(hoa, &activations);
        let time_frac = fraction(time_sat, time_total);
        let link_frac = fraction(link_sat, link_total);
        SCORE_NODES * node_frac + SCORE_TIMES * time_frac + SCORE_LINKS * link_frac
    }

    /// Walk the dependency graph, returning per-node activations indexed
    /// by graph node index. Stops at the first constituent that fails to
    /// activate, keeping the partial result.
    fn run(
        store: &AutomatonStore,
        hoa: &Hoa,
        matrix: &SymbolMatrix,
        start: Coord,
    ) -> Vec<Option<Activation>> {
        let mut activations: Vec<Option<Activation>> = vec![None; hoa.node_count()];
        if hoa.node_count() == 0 {
            return activations;
        }

        let entry = hoa.entry();
        let Some(first) = apply_automaton(store, hoa.graph[entry].automaton, matrix, start)
        else {
            return activations;
        };
        let mut claimed: BTreeSet<Coord> = first.visited.iter().copied().collect();
        activations[entry.index()] = Some(first);

        let mut queue = VecDeque::from([entry]);
        'walk: while let Some(pred) = queue.pop_front() {
            let Some(pred_act) = activations[pred.index()].clone() else {
                continue;
            };
            for (succ, edge) in hoa.edges_in_id_order(pred) {
                if activations[succ.index()].is_some() {
                    continue;
                }
                let automaton = hoa.graph[succ].automaton;
                let found = match edge.move_type {
                    MoveType::Start => pred_act
                        .start()
                        .and_then(|c| apply_automaton(store, automaton, matrix, c)),
                    MoveType::StartOffset(d) => pred_act
                        .start()
                        .and_then(|c| apply_automaton(store, automaton, matrix, c.step(d))),
                    MoveType::EndOffset(d) => pred_act
                        .end()
                        .and_then(|c| apply_automaton(store, automaton, matrix, c.step(d))),
                    MoveType::Incident(d) => Self::scan_interior(
                        store,
                        automaton,
                        matrix,
                        pred_act.interior(),
                        Some(d),
                        &claimed,
                    ),
                    MoveType::None => Self::scan_interior(
                        store,
                        automaton,
                        matrix,
                        pred_act.interior(),
                        None,
                        &claimed,
                    ),
                };
                match found {
                    Some(act) => {
                        claimed.extend(act.visited.iter().copied());
                        activations[succ.index()] = Some(act);
                        queue.push_back(succ);
                    }
                    None => break 'walk,
                }
            }
        }
        activations
    }

    /// Scan the predecessor's interior coordinates (offset by `dir` when
    /// given), skipping candidates already claimed by earlier
    /// constituents, and commit to the last recognizing candidate.
    fn scan_interior(
        store: &AutomatonStore,
        automaton: AutomatonRef,
        matrix: &SymbolMatrix,
        interior: &[Coord],
        dir: Option<Direction>,
        claimed: &BTreeSet<Coord>,
    ) -> Option<Activation> {
        let mut chosen = None;
        for &coord in interior {
            let candidate = match dir {
                Some(d) => coord.step(d),
                None => coord,
            };
            if claimed.contains(&candidate) {
                continue;
            }
            if let Some(act) = apply_automaton(store, automaton, matrix, candidate) {
                chosen = Some(act);
            }
        }
        chosen
    }

    fn time_constraint_stats(hoa: &Hoa, activations: &[Option<Activation>]) -> (usize, usize) {
        let total = hoa.identical_at.len() + hoa.semi_identical_at.len();
        let mut sat = 0;
        for &(i, j) in &hoa.identical_at {
            if let (Some(a), Some(b)) = (Self::by_id(hoa, activations, i), Self::by_id(hoa, activations, j)) {
                if a.time == b.time {
                    sat += 1;
                }
            }
        }
        for &(i, j) in &hoa.semi_identical_at {
            if let (Some(a), Some(b)) = (Self::by_id(hoa, activations, i), Self::by_id(hoa, activations, j)) {
                if a.time.abs_diff(b.time) == 1 {
                    sat += 1;
                }
            }
        }
        (sat, total)
    }

    fn link_constraint_stats(hoa: &Hoa, activations: &[Option<Activation>]) -> (usize, usize) {
        let total = hoa.link_constraints.len();
        let mut sat = 0;
        for &(i, j, constraint) in &hoa.link_constraints {
            if let (Some(a), Some(b)) = (Self::by_id(hoa, activations, i), Self::by_id(hoa, activations, j)) {
                if Self::link_holds(constraint, a, b) {
                    sat += 1;
                }
            }
        }
        (sat, total)
    }

    fn link_holds(constraint: LinkConstraint, pred: &Activation, succ: &Activation) -> bool {
        match constraint {
            LinkConstraint::End => {
                pred.end().is_some() && pred.end() == succ.end()
            }
            LinkConstraint::Incident(d) => succ
                .end()
                .is_some_and(|end| pred.interior().contains(&end.step(d))),
        }
    }

    /// Activation of the node with a given learning-time id.
    fn by_id<'a>(
        hoa: &Hoa,
        activations: &'a [Option<Activation>],
        id: usize,
    ) -> Option<&'a Activation> {
        hoa.graph
            .node_indices()
            .find(|&n| hoa.graph[n].id == id)
            .and_then(|n| activations[n.index()].as_ref())
    }
}

/// `sat / total`, with an empty constraint set counting as satisfied.
fn fraction(sat: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        sat as f64 / total as f64
    }
}
