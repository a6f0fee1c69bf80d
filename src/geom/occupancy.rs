use ndarray::Array3;

use crate::Point;

/// Cached containment state of one voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occupancy {
    #[default]
    Unknown,
    Inside,
    Outside,
}

/// Lazily filled voxel grid memoizing point containment over the crystal's
/// bounding box.
///
/// A voxel is computed once and never revisited, so containment is treated as
/// constant within each voxel.
pub struct OccupancyCache {
    cells: Array3<Occupancy>,
    origin: Point,
    /// Voxels per nanometre.
    scale: f64,
}

impl OccupancyCache {
    /// Creates an empty cache spanning `bbox_min..=bbox_max` (nm).
    pub fn new(bbox_min: Point, bbox_max: Point, voxels_per_micron: f64) -> Self {
        let scale = voxels_per_micron / 1000.0;
        let cells_along = |lo: f64, hi: f64| ((hi - lo) * scale).round().max(0.0) as usize + 1;
        let shape = (
            cells_along(bbox_min.x, bbox_max.x),
            cells_along(bbox_min.y, bbox_max.y),
            cells_along(bbox_min.z, bbox_max.z),
        );
        Self {
            cells: Array3::from_elem(shape, Occupancy::Unknown),
            origin: bbox_min,
            scale,
        }
    }

    /// Returns the voxel holding `pos`, or `None` if it falls outside the grid.
    pub fn index_of(&self, pos: Point) -> Option<(usize, usize, usize)> {
        let (ni, nj, nk) = self.cells.dim();
        let idx = |c: f64, o: f64, n: usize| -> Option<usize> {
            let i = ((c - o) * self.scale).round();
            if i >= 0.0 && (i as usize) < n {
                Some(i as usize)
            } else {
                None
            }
        };
        Some((
            idx(pos.x, self.origin.x, ni)?,
            idx(pos.y, self.origin.y, nj)?,
            idx(pos.z, self.origin.z, nk)?,
        ))
    }

    pub fn get(&self, index: (usize, usize, usize)) -> Occupancy {
        self.cells[index]
    }

    /// Stores the containment of a voxel. Already computed voxels keep their value.
    pub fn set(&mut self, index: (usize, usize, usize), inside: bool) {
        let cell = &mut self.cells[index];
        if *cell == Occupancy::Unknown {
            *cell = if inside {
                Occupancy::Inside
            } else {
                Occupancy::Outside
            };
        }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.cells.dim()
    }

    /// Number of voxels whose containment has been computed.
    pub fn computed_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| **c != Occupancy::Unknown)
            .count()
    }
}
