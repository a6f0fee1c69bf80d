//! Ray casting against triangulated surfaces.
//!
//! The plane hit distance is solved from `n·(o + t·d) + offset = 0` and the
//! hit point is then tested against the triangle with an even-odd crossing
//! test on its 2D projection.

use crate::geom::polyhedron::Polyhedron;
use crate::{Point, Vector};

/// A ray defined by an origin point and a unit direction vector.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point,
    pub direction: Vector,
}

impl Ray {
    /// Creates a new ray. The direction is normalized; a zero vector gives `None`.
    pub fn new(origin: Point, direction: Vector) -> Option<Self> {
        let direction = direction.normalize()?;
        Some(Self { origin, direction })
    }

    /// Returns the point along the ray at parameter t.
    pub fn point_at(&self, t: f64) -> Point {
        self.origin + self.direction * t
    }

    /// Signed distance along the ray to the plane of triangle `index`.
    ///
    /// Returns `None` for backward, NaN or infinite results (a ray parallel to
    /// the plane divides by zero).
    pub fn plane_distance(&self, polyhedron: &Polyhedron, index: usize) -> Option<f64> {
        let normal = polyhedron.normals()[index];
        let offset = polyhedron.offsets()[index];
        let t = -(normal.dot_point(self.origin) + offset) / normal.dot(self.direction);
        if t.is_finite() && t >= 0.0 {
            Some(t)
        } else {
            None
        }
    }

    /// Returns the distance to triangle `index` if the ray hits it.
    pub fn intersect_triangle(&self, polyhedron: &Polyhedron, index: usize) -> Option<f64> {
        let t = self.plane_distance(polyhedron, index)?;
        let hit = self.point_at(t);
        let corners = polyhedron.triangle_points(index);
        if is_point_in_projected_polygon(hit, &corners, polyhedron.normals()[index]) {
            Some(t)
        } else {
            None
        }
    }

    /// Number of triangles crossed by the ray (each forward hit counted once).
    pub fn count_crossings(&self, polyhedron: &Polyhedron) -> usize {
        (0..polyhedron.triangles().len())
            .filter(|&i| self.intersect_triangle(polyhedron, i).is_some())
            .count()
    }

    /// Distance to the closest triangle hit further than `min_t`, if any.
    pub fn closest_hit(&self, polyhedron: &Polyhedron, min_t: f64) -> Option<f64> {
        (0..polyhedron.triangles().len())
            .filter_map(|i| self.intersect_triangle(polyhedron, i))
            .filter(|&t| t > min_t)
            .min_by(f64::total_cmp)
    }
}

/// Even-odd crossing test of `ptest` against a planar polygon.
///
/// The polygon and point are projected onto the coordinate plane that drops
/// the dominant axis of `normal`, which keeps the projection non-degenerate.
pub fn is_point_in_projected_polygon(ptest: Point, polygon: &[Point], normal: Vector) -> bool {
    let (ax, ay, az) = (normal.dx.abs(), normal.dy.abs(), normal.dz.abs());
    let project = |p: &Point| -> (f64, f64) {
        if az >= ax && az >= ay {
            (p.x, p.y)
        } else if ay >= ax {
            (p.z, p.x)
        } else {
            (p.y, p.z)
        }
    };
    let (u, v) = project(&ptest);
    let pts: Vec<(f64, f64)> = polygon.iter().map(project).collect();

    let mut inside = false;
    let n = pts.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (ui, vi) = pts[i];
        let (uj, vj) = pts[j];
        if (vi > v) != (vj > v) && u < (uj - ui) * (v - vi) / (vj - vi) + ui {
            inside = !inside;
        }
        j = i;
    }
    inside
}
