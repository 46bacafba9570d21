//! Scene object segmentation: connected-component extraction of the
//! distinct objects in a scene matrix.

use crate::grid::{Coord, Direction};
use crate::matrix::SymbolMatrix;
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;

/// Identify the objects of a scene: weakly-connected components of the
/// Moore-adjacency graph, each translated to its local origin.
///
/// With `remove_internal`, pixels whose 8 neighbors are all present are
/// dropped before segmentation (outline-only objects).
pub fn identify_objects_with(matrix: &SymbolMatrix, remove_internal: bool) -> Vec<SymbolMatrix> {
    let mut coords = matrix.non_blank();
    if remove_internal {
        coords.retain(|&c| {
            Direction::ALL
                .iter()
                .any(|&d| matrix.is_blank(c.step(d)))
        });
    }

    let index: BTreeMap<Coord, usize> = coords
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, i))
        .collect();

    let mut uf = UnionFind::new(coords.len());
    for (&coord, &i) in &index {
        for dir in Direction::ALL {
            if let Some(&j) = index.get(&coord.step(dir)) {
                uf.union(i, j);
            }
        }
    }

    // Group by component root, preserving read order of first appearance.
    let mut components: BTreeMap<usize, Vec<Coord>> = BTreeMap::new();
    for (i, &coord) in coords.iter().enumerate() {
        components.entry(uf.find(i)).or_default().push(coord);
    }

    let mut objects: Vec<(Coord, SymbolMatrix)> = components
        .into_values()
        .map(|component| object_matrix(matrix, &component))
        .collect();
    // Read order of each object's first pixel.
    objects.sort_by_key(|(first, _)| *first);
    objects.into_iter().map(|(_, m)| m).collect()
}

/// Identify the objects of a scene (internal pixels kept).
pub fn identify_objects(matrix: &SymbolMatrix) -> Vec<SymbolMatrix> {
    identify_objects_with(matrix, false)
}

/// Translate one component to its local origin.
fn object_matrix(matrix: &SymbolMatrix, component: &[Coord]) -> (Coord, SymbolMatrix) {
    let min_row = component.iter().map(|c| c.row).min().unwrap_or(0);
    let min_col = component.iter().map(|c| c.col).min().unwrap_or(0);
    let max_row = component.iter().map(|c| c.row).max().unwrap_or(0);
    let max_col = component.iter().map(|c| c.col).max().unwrap_or(0);

    let mut object = SymbolMatrix::empty(
        (max_row - min_row + 1) as usize,
        (max_col - min_col + 1) as usize,
    );
    for &coord in component {
        if let Some(symbol) = matrix.get(coord) {
            object.set(
                Coord::new(coord.row - min_row, coord.col - min_col),
                symbol,
            );
        }
    }
    let first = component.iter().min().copied().unwrap_or(Coord::new(0, 0));
    (first, object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_objects_split_and_translated() {
        let scene = SymbolMatrix::from_lines(&[
            "xx    ",
            "xx    ",
            "    yy",
        ]);
        let objects = identify_objects(&scene);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], SymbolMatrix::from_lines(&["xx", "xx"]));
        assert_eq!(objects[1], SymbolMatrix::from_lines(&["yy"]));
    }

    #[test]
    fn test_diagonal_touch_is_one_object() {
        let scene = SymbolMatrix::from_lines(&["x ", " x"]);
        assert_eq!(identify_objects(&scene).len(), 1);
    }

    #[test]
    fn test_empty_scene() {
        assert!(identify_objects(&SymbolMatrix::empty(3, 3)).is_empty());
    }

    #[test]
    fn test_remove_internal_pixels() {
        let scene = SymbolMatrix::from_lines(&["xxx", "xxx", "xxx"]);
        let objects = identify_objects_with(&scene, true);
        assert_eq!(objects.len(), 1);
        // Center pixel dropped, ring remains.
        assert_eq!(objects[0], SymbolMatrix::from_lines(&["xxx", "x x", "xxx"]));
    }

    #[test]
    fn test_object_order_is_read_order() {
        let scene = SymbolMatrix::from_lines(&[
            "  z",
            "   ",
            "a  ",
        ]);
        let objects = identify_objects(&scene);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], SymbolMatrix::from_lines(&["z"]));
        assert_eq!(objects[1], SymbolMatrix::from_lines(&["a"]));
    }
}
