use serde::{Deserialize, Serialize};

use crate::palette::{Material, MaterialCounts};

/// One map cell: a material plus a height in [0, 100]. The height doubles as
/// the HSV value channel when the map is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub material: Material,
    pub height: f64,
}

/// The shared mutable grid every generation pass reads and writes in place.
/// Allocated once at a fixed resolution; indexed row-major as `cells[y][x]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    /// A fresh grid of grass. Heights start at zero and are only meaningful
    /// once the relief pass has run.
    pub fn new(width: usize, height: usize) -> Self {
        let cells = vec![
            vec![
                Cell {
                    material: Material::Grass,
                    height: 0.0,
                };
                width
            ];
            height
        ];
        Grid {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height
    }

    /// Panics when (x, y) is out of bounds; callers bounds-check neighbor
    /// offsets with `in_bounds` first.
    pub fn get(&self, x: i32, y: i32) -> Cell {
        assert!(self.in_bounds(x, y), "cell ({}, {}) is off the map", x, y);
        self.cells[y as usize][x as usize]
    }

    pub fn get_mut(&mut self, x: i32, y: i32) -> &mut Cell {
        assert!(self.in_bounds(x, y), "cell ({}, {}) is off the map", x, y);
        &mut self.cells[y as usize][x as usize]
    }

    /// Tally of the materials in the square radius-`radius` neighborhood of
    /// (x, y), origin excluded, off-map offsets skipped.
    fn neighbor_counts(&self, x: i32, y: i32, radius: i32) -> MaterialCounts {
        let mut counts = MaterialCounts::new();
        for j in -radius..=radius {
            for i in -radius..=radius {
                if i == 0 && j == 0 {
                    continue;
                }
                if self.in_bounds(x + i, y + j) {
                    counts.record(self.get(x + i, y + j).material);
                }
            }
        }
        counts
    }

    /// The most frequent material around (x, y).
    pub fn dominant_neighbor(&self, x: i32, y: i32, radius: i32) -> (Material, u32) {
        self.neighbor_counts(x, y, radius).dominant()
    }

    /// The most frequent non-water material around (x, y).
    pub fn dominant_land_neighbor(&self, x: i32, y: i32, radius: i32) -> (Material, u32) {
        let mut counts = self.neighbor_counts(x, y, radius);
        counts.clear(Material::Water);
        counts.dominant()
    }

    /// Number of non-water cells in the 8-neighborhood of (x, y).
    pub fn non_water_neighbors(&self, x: i32, y: i32) -> u32 {
        let mut count = 0;
        for j in -1..=1 {
            for i in -1..=1 {
                if i == 0 && j == 0 {
                    continue;
                }
                if self.in_bounds(x + i, y + j) && self.get(x + i, y + j).material != Material::Water
                {
                    count += 1;
                }
            }
        }
        count
    }
}
