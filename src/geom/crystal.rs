//! Crystal containment queries.
//!
//! A point is inside when a ray cast from it along +z crosses the surface an
//! odd number of times. Results are memoized per voxel of the crystal's
//! bounding box, see [`OccupancyCache`].

use anyhow::{Result, ensure};

use crate::geom::bboxes::is_point_inside_bbox;
use crate::geom::occupancy::{Occupancy, OccupancyCache};
use crate::geom::polyhedron::Polyhedron;
use crate::geom::ray::Ray;
use crate::{Point, Vector};

/// Offset applied to the query x coordinate when it equals y.
const DIAGONAL_NUDGE: f64 = 1e-6;

/// Micrometres to nanometres.
pub const NM_PER_UM: f64 = 1000.0;

pub struct CrystalGeometry {
    /// Crystal surface in nm.
    polyhedron: Polyhedron,
    bbox_min: Point,
    bbox_max: Point,
    voxels_per_micron: f64,
    occupancy: OccupancyCache,
}

impl CrystalGeometry {
    /// Creates the geometry from a polyhedron given in nm.
    pub fn new(polyhedron: Polyhedron, voxels_per_micron: f64) -> Result<Self> {
        ensure!(
            voxels_per_micron > 0.0 && voxels_per_micron.is_finite(),
            "Voxels per micron must be positive, got {voxels_per_micron}"
        );
        let (bbox_min, bbox_max) = polyhedron.bounding_box();
        let occupancy = OccupancyCache::new(bbox_min, bbox_max, voxels_per_micron);
        Ok(Self {
            polyhedron,
            bbox_min,
            bbox_max,
            voxels_per_micron,
            occupancy,
        })
    }

    /// Creates the geometry from a polyhedron given in µm.
    pub fn from_micrometres(mut polyhedron: Polyhedron, voxels_per_micron: f64) -> Result<Self> {
        polyhedron.scale(NM_PER_UM)?;
        Self::new(polyhedron, voxels_per_micron)
    }

    pub fn polyhedron(&self) -> &Polyhedron {
        &self.polyhedron
    }

    pub fn bbox(&self) -> (Point, Point) {
        (self.bbox_min, self.bbox_max)
    }

    pub fn voxels_per_micron(&self) -> f64 {
        self.voxels_per_micron
    }

    pub fn occupancy(&self) -> &OccupancyCache {
        &self.occupancy
    }

    /// Crystal depth along the beam (z extent) in nm.
    pub fn thickness(&self) -> f64 {
        self.bbox_max.z - self.bbox_min.z
    }

    /// Cached containment test.
    pub fn is_inside(&mut self, pos: Point) -> bool {
        if !is_point_inside_bbox(pos, self.bbox_min, self.bbox_max) {
            return false;
        }
        let Some(index) = self.occupancy.index_of(pos) else {
            return self.is_inside_uncached(pos);
        };
        match self.occupancy.get(index) {
            Occupancy::Inside => true,
            Occupancy::Outside => false,
            Occupancy::Unknown => {
                let inside = self.is_inside_uncached(pos);
                self.occupancy.set(index, inside);
                inside
            }
        }
    }

    /// Containment by ray casting, bypassing the voxel cache.
    pub fn is_inside_uncached(&self, pos: Point) -> bool {
        if !is_point_inside_bbox(pos, self.bbox_min, self.bbox_max) {
            return false;
        }
        let mut origin = pos;
        if origin.x == origin.y {
            origin.x += DIAGONAL_NUDGE;
        }
        let ray = Ray {
            origin,
            direction: Vector::new(0.0, 0.0, 1.0),
        };
        let mut inside = false;
        for i in 0..self.polyhedron.triangles().len() {
            if ray.intersect_triangle(&self.polyhedron, i).is_some() {
                inside = !inside;
            }
        }
        inside
    }

    /// Distance from `origin` along `direction` to the nearest surface crossing.
    ///
    /// Crossings closer than a tiny tolerance are ignored so that a point
    /// sitting on the surface finds the next crossing.
    pub fn intersection_distance(&self, origin: Point, direction: Vector) -> Option<f64> {
        let ray = Ray::new(origin, direction)?;
        let min_t = 1e-9 * (1.0 + self.thickness());
        ray.closest_hit(&self.polyhedron, min_t)
    }

    /// Point at `distance` along `direction` from `origin`.
    pub fn intersection_point(distance: f64, origin: Point, direction: Vector) -> Point {
        let dir = direction.normalize().unwrap_or(direction);
        origin + dir * distance
    }

    /// Distance in the xy plane from `(x, y)` to the crystal's projected
    /// bounding rectangle. Zero inside the rectangle.
    pub fn lateral_distance(&self, x: f64, y: f64) -> f64 {
        let dx = (self.bbox_min.x - x).max(0.0).max(x - self.bbox_max.x);
        let dy = (self.bbox_min.y - y).max(0.0).max(y - self.bbox_max.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Estimates the crystal volume (nm³) whose projection lies in `footprint`.
    ///
    /// Cell centres of a regular grid over the bounding box are classified with
    /// the uncached ray cast.
    pub fn exposed_volume<F>(&self, footprint: F, samples_per_axis: usize) -> f64
    where
        F: Fn(f64, f64) -> bool,
    {
        let n = samples_per_axis.max(1);
        let step = |lo: f64, hi: f64| (hi - lo) / n as f64;
        let (sx, sy, sz) = (
            step(self.bbox_min.x, self.bbox_max.x),
            step(self.bbox_min.y, self.bbox_max.y),
            step(self.bbox_min.z, self.bbox_max.z),
        );
        let mut count = 0usize;
        for i in 0..n {
            let x = self.bbox_min.x + (i as f64 + 0.5) * sx;
            for j in 0..n {
                let y = self.bbox_min.y + (j as f64 + 0.5) * sy;
                if !footprint(x, y) {
                    continue;
                }
                for k in 0..n {
                    let z = self.bbox_min.z + (k as f64 + 0.5) * sz;
                    if self.is_inside_uncached(Point::new(x, y, z)) {
                        count += 1;
                    }
                }
            }
        }
        count as f64 * sx * sy * sz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_crystal(dx: f64, dy: f64, dz: f64, vpm: f64) -> CrystalGeometry {
        let poly = Polyhedron::from_box(dx, dy, dz, Point::new(0.0, 0.0, 0.0)).unwrap();
        CrystalGeometry::new(poly, vpm).unwrap()
    }

    /// Regular octahedron |x| + |y| + |z| <= r.
    fn octahedron(r: f64) -> Polyhedron {
        let vertices = vec![
            Point::new(r, 0.0, 0.0),
            Point::new(-r, 0.0, 0.0),
            Point::new(0.0, r, 0.0),
            Point::new(0.0, -r, 0.0),
            Point::new(0.0, 0.0, r),
            Point::new(0.0, 0.0, -r),
        ];
        // 1-based faces, counter-clockwise seen from outside
        let faces = [
            [1, 3, 5],
            [3, 2, 5],
            [2, 4, 5],
            [4, 1, 5],
            [3, 1, 6],
            [2, 3, 6],
            [4, 2, 6],
            [1, 4, 6],
        ];
        Polyhedron::from_one_based(vertices, &faces).unwrap()
    }

    #[test]
    fn test_box_containment() {
        let mut crystal = box_crystal(2000.0, 2000.0, 2000.0, 10.0);
        assert!(crystal.is_inside(Point::new(100.0, -300.0, 50.0)));
        assert!(crystal.is_inside(Point::new(-900.0, 900.0, -900.0)));
        assert!(!crystal.is_inside(Point::new(1200.0, 0.0, 0.0)));
        assert!(!crystal.is_inside(Point::new(0.0, 0.0, -1500.0)));
    }

    #[test]
    fn test_diagonal_point_is_nudged() {
        // x == y lies on the diagonal of the box's top and bottom faces
        let crystal = box_crystal(2000.0, 2000.0, 2000.0, 1.0);
        assert!(crystal.is_inside_uncached(Point::new(250.0, 250.0, 0.0)));
        assert!(crystal.is_inside_uncached(Point::new(0.0, 0.0, 0.0)));
        assert!(!crystal.is_inside_uncached(Point::new(1100.0, 1100.0, 0.0)));
    }

    #[test]
    fn test_convex_containment_matches_analytic() {
        let r = 1000.0;
        let crystal = CrystalGeometry::new(octahedron(r), 10.0).unwrap();
        let n = 17;
        let mut checked = 0;
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let f = |c: usize| -1.3 * r + 2.6 * r * (c as f64 + 0.37) / n as f64;
                    let p = Point::new(f(i), f(j), f(k));
                    let level = p.x.abs() + p.y.abs() + p.z.abs();
                    // Skip points within a thin shell around the surface
                    if (level - r).abs() < 1e-3 * r {
                        continue;
                    }
                    assert_eq!(
                        crystal.is_inside_uncached(p),
                        level < r,
                        "Containment mismatch at {p}"
                    );
                    checked += 1;
                }
            }
        }
        assert!(checked > 4000);
    }

    #[test]
    fn test_cache_is_filled_lazily() {
        let mut crystal = box_crystal(2000.0, 2000.0, 2000.0, 1.0);
        assert_eq!(crystal.occupancy().computed_count(), 0);
        assert!(crystal.is_inside(Point::new(10.0, 20.0, 30.0)));
        assert_eq!(crystal.occupancy().computed_count(), 1);
        // Same voxel, no new computation
        assert!(crystal.is_inside(Point::new(40.0, -20.0, 60.0)));
        assert_eq!(crystal.occupancy().computed_count(), 1);
        // Outside the bounding box never touches the cache
        assert!(!crystal.is_inside(Point::new(5000.0, 0.0, 0.0)));
        assert_eq!(crystal.occupancy().computed_count(), 1);
    }

    #[test]
    fn test_intersection_distance() {
        let crystal = box_crystal(2000.0, 2000.0, 2000.0, 1.0);
        let up = Vector::new(0.0, 0.0, 1.0);

        let from_below = Point::new(100.0, 200.0, -3000.0);
        let d = crystal.intersection_distance(from_below, up).unwrap();
        assert!((d - 2000.0).abs() < 1e-6);
        let entry = CrystalGeometry::intersection_point(d, from_below, up);
        assert!((entry.z + 1000.0).abs() < 1e-6);

        // From the entry point the next crossing is the back face
        let d_exit = crystal.intersection_distance(entry, up).unwrap();
        assert!((d_exit - 2000.0).abs() < 1e-6);

        // Pointing away
        assert!(crystal.intersection_distance(from_below, up * -1.0).is_none());
    }

    #[test]
    fn test_lateral_distance() {
        let crystal = box_crystal(2000.0, 2000.0, 2000.0, 1.0);
        assert_eq!(crystal.lateral_distance(0.0, 0.0), 0.0);
        assert!((crystal.lateral_distance(1500.0, 0.0) - 500.0).abs() < 1e-9);
        assert!((crystal.lateral_distance(-1300.0, 1400.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_exposed_volume() {
        let crystal = box_crystal(2000.0, 2000.0, 1000.0, 1.0);
        let full = crystal.exposed_volume(|_, _| true, 20);
        assert!((full - 4.0e9).abs() / 4.0e9 < 1e-9);
        // Beam covering half the crystal in x
        let half = crystal.exposed_volume(|x, _| x < 0.0, 20);
        assert!((half - 2.0e9).abs() / 2.0e9 < 1e-9);
    }
}
