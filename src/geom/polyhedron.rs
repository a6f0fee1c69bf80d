//! Closed triangulated surface of a crystal.
//!
//! Triangles are wound counter-clockwise when seen from outside, so the
//! derived normals point outwards. The containment parity rule in
//! [`crate::geom::crystal`] relies on this.

use crate::geom::bboxes::bounding_box;
use crate::{Point, Vector};
use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

/// Vertex indices (0-based) of one triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleIndex(pub usize, pub usize, pub usize);

#[derive(Debug, Clone)]
pub struct Polyhedron {
    vertices: Vec<Point>,
    triangles: Vec<TriangleIndex>,
    /// Outward unit normal per triangle.
    normals: Vec<Vector>,
    /// Plane offset `d` per triangle, such that `n·p + d = 0` on the plane.
    offsets: Vec<f64>,
}

impl Polyhedron {
    /// Creates a polyhedron from vertices and 0-based triangle indices.
    pub fn new(vertices: Vec<Point>, triangles: Vec<TriangleIndex>) -> Result<Self> {
        ensure!(!triangles.is_empty(), "Polyhedron needs at least one triangle");
        let num_vertices = vertices.len();
        for (i, tri) in triangles.iter().enumerate() {
            ensure!(
                tri.0 < num_vertices && tri.1 < num_vertices && tri.2 < num_vertices,
                "Triangle {i} references a vertex outside 0..{num_vertices}: {tri:?}"
            );
        }
        let mut polyhedron = Self {
            vertices,
            triangles,
            normals: Vec::new(),
            offsets: Vec::new(),
        };
        polyhedron.update_planes()?;
        Ok(polyhedron)
    }

    /// Creates a polyhedron from faces using 1-based vertex indices, as found
    /// in crystal shape files.
    pub fn from_one_based(vertices: Vec<Point>, faces: &[[usize; 3]]) -> Result<Self> {
        let triangles = faces
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if f.contains(&0) {
                    Err(anyhow!("Face {i} uses index 0, but indices are 1-based"))
                } else {
                    Ok(TriangleIndex(f[0] - 1, f[1] - 1, f[2] - 1))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(vertices, triangles)
    }

    /// Returns an axis-aligned cuboid with dimensions `dx`, `dy`, `dz` centred at `centre`.
    pub fn from_box(dx: f64, dy: f64, dz: f64, centre: Point) -> Result<Self> {
        ensure!(
            dx > 0.0 && dy > 0.0 && dz > 0.0,
            "Box dimensions must be positive, got ({dx}, {dy}, {dz})"
        );
        let (x0, x1) = (centre.x - dx / 2.0, centre.x + dx / 2.0);
        let (y0, y1) = (centre.y - dy / 2.0, centre.y + dy / 2.0);
        let (z0, z1) = (centre.z - dz / 2.0, centre.z + dz / 2.0);
        let vertices = vec![
            Point::new(x0, y0, z0),
            Point::new(x1, y0, z0),
            Point::new(x1, y1, z0),
            Point::new(x0, y1, z0),
            Point::new(x0, y0, z1),
            Point::new(x1, y0, z1),
            Point::new(x1, y1, z1),
            Point::new(x0, y1, z1),
        ];
        let triangles = vec![
            // -z
            TriangleIndex(0, 3, 2),
            TriangleIndex(0, 2, 1),
            // +z
            TriangleIndex(4, 5, 6),
            TriangleIndex(4, 6, 7),
            // -y
            TriangleIndex(0, 1, 5),
            TriangleIndex(0, 5, 4),
            // +y
            TriangleIndex(3, 7, 6),
            TriangleIndex(3, 6, 2),
            // -x
            TriangleIndex(0, 4, 7),
            TriangleIndex(0, 7, 3),
            // +x
            TriangleIndex(1, 2, 6),
            TriangleIndex(1, 6, 5),
        ];
        Self::new(vertices, triangles)
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[TriangleIndex] {
        &self.triangles
    }

    pub fn normals(&self) -> &[Vector] {
        &self.normals
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Returns the corner points of triangle `index`.
    pub fn triangle_points(&self, index: usize) -> [Point; 3] {
        let tri = &self.triangles[index];
        [
            self.vertices[tri.0],
            self.vertices[tri.1],
            self.vertices[tri.2],
        ]
    }

    /// Replaces the vertices and recomputes all normals and plane offsets.
    pub fn set_vertices(&mut self, vertices: Vec<Point>) -> Result<()> {
        ensure!(
            vertices.len() == self.vertices.len(),
            "Expected {} vertices, got {}",
            self.vertices.len(),
            vertices.len()
        );
        self.vertices = vertices;
        self.update_planes()
    }

    /// Multiplies all vertex coordinates by `factor` (e.g. µm -> nm).
    pub fn scale(&mut self, factor: f64) -> Result<()> {
        let scaled = self.vertices.iter().map(|v| v.scale(factor)).collect();
        self.set_vertices(scaled)
    }

    /// Returns the (min, max) corners of the bounding box.
    pub fn bounding_box(&self) -> (Point, Point) {
        // Construction guarantees at least one triangle, hence at least 3 vertices
        bounding_box(&self.vertices).unwrap_or((Point::new(0., 0., 0.), Point::new(0., 0., 0.)))
    }

    /// Enclosed volume computed with the divergence theorem.
    pub fn volume(&self) -> f64 {
        let six_v: f64 = (0..self.triangles.len())
            .map(|i| {
                let [p0, p1, p2] = self.triangle_points(i);
                let a = Vector::new(p0.x, p0.y, p0.z);
                let b = Vector::new(p1.x, p1.y, p1.z);
                let c = Vector::new(p2.x, p2.y, p2.z);
                a.dot(b.cross(c))
            })
            .sum();
        (six_v / 6.0).abs()
    }

    fn update_planes(&mut self) -> Result<()> {
        let mut normals = Vec::with_capacity(self.triangles.len());
        let mut offsets = Vec::with_capacity(self.triangles.len());
        for i in 0..self.triangles.len() {
            let [p0, p1, p2] = self.triangle_points(i);
            let vn = Vector::normal(p0, p1, p2)
                .ok_or_else(|| anyhow!("Triangle {i} is degenerate (zero area)"))?;
            offsets.push(-vn.dot_point(p0));
            normals.push(vn);
        }
        self.normals = normals;
        self.offsets = offsets;
        Ok(())
    }
}
