pub mod bboxes;
pub mod crystal;
pub mod occupancy;
pub mod point;
pub mod polyhedron;
pub mod ray;
pub mod vector;

/// Geometric precision
pub const EPS: f64 = 1e-12;
