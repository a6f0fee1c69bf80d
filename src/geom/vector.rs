use crate::Point;
use crate::geom::EPS;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// Direction or displacement in crystal coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Vector {
    pub fn new(dx: f64, dy: f64, dz: f64) -> Self {
        Self { dx, dy, dz }
    }

    /// Displacement from `beg` to `end`.
    pub fn from_points(beg: Point, end: Point) -> Self {
        end - beg
    }

    /// Unit vector for polar angle `theta` (from +z) and azimuth `phi` (from +x).
    pub fn from_angles(theta: f64, phi: f64) -> Self {
        let (sin_t, cos_t) = theta.sin_cos();
        let (sin_p, cos_p) = phi.sin_cos();
        Self::new(sin_t * cos_p, sin_t * sin_p, cos_t)
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.dy * other.dz - self.dz * other.dy,
            self.dz * other.dx - self.dx * other.dz,
            self.dx * other.dy - self.dy * other.dx,
        )
    }

    pub fn dot(self, other: Self) -> f64 {
        self.dx * other.dx + self.dy * other.dy + self.dz * other.dz
    }

    /// Dot product with `pt` taken as a position vector (plane offsets).
    pub fn dot_point(self, pt: Point) -> f64 {
        self.dx * pt.x + self.dy * pt.y + self.dz * pt.z
    }

    pub fn length(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    pub fn is_close(&self, other: &Self) -> bool {
        (self.dx - other.dx).abs() < EPS
            && (self.dy - other.dy).abs() < EPS
            && (self.dz - other.dz).abs() < EPS
    }

    /// Unit vector with the same direction. `None` for a zero vector.
    pub fn normalize(&self) -> Option<Self> {
        let len = self.length();
        (len >= EPS).then(|| *self * (1.0 / len))
    }

    /// Unit normal of the triangle `pt0, pt1, pt2` (right-hand winding).
    ///
    /// Collinear points have no normal.
    pub fn normal(pt0: Point, pt1: Point, pt2: Point) -> Option<Self> {
        Self::from_points(pt0, pt1)
            .cross(Self::from_points(pt0, pt2))
            .normalize()
    }
}

impl Add for Vector {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.dx + other.dx, self.dy + other.dy, self.dz + other.dz)
    }
}

impl Mul<f64> for Vector {
    type Output = Self;
    fn mul(self, factor: f64) -> Self {
        Self::new(self.dx * factor, self.dy * factor, self.dz * factor)
    }
}
