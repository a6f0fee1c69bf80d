//! Wavefront OBJ reader for crystal shapes.
//!
//! Only `v` and `f` records are used. Face indices are 1-based and may be
//! written as `i/t/n` or as negative (relative to the end of the vertex list).
//! Polygons with more than three vertices are fan-triangulated.

use crate::Point;
use crate::geom::polyhedron::{Polyhedron, TriangleIndex};
use anyhow::{Context, Result, anyhow, bail};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a polyhedron from an OBJ file. Coordinates are kept as written.
pub fn read_obj(path: &Path) -> Result<Polyhedron> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_obj(&content).with_context(|| format!("Invalid OBJ file: {}", path.display()))
}

/// Parses OBJ text into a polyhedron.
pub fn parse_obj(content: &str) -> Result<Polyhedron> {
    let mut vertices: Vec<Point> = Vec::new();
    let mut triangles: Vec<TriangleIndex> = Vec::new();

    for (num, line) in content.lines().enumerate() {
        let line_no = num + 1;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let coords: Vec<f64> = parts
                    .take(3)
                    .map(|s| s.parse::<f64>())
                    .collect::<Result<_, _>>()
                    .with_context(|| format!("Invalid vertex on line {line_no}"))?;
                if coords.len() != 3 {
                    bail!("Vertex on line {line_no} needs 3 coordinates");
                }
                vertices.push(Point::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let face: Vec<usize> = parts
                    .map(|tok| resolve_index(tok, vertices.len()))
                    .collect::<Result<_>>()
                    .with_context(|| format!("Invalid face on line {line_no}"))?;
                if face.len() < 3 {
                    bail!("Face on line {line_no} has fewer than 3 vertices");
                }
                for k in 1..face.len() - 1 {
                    triangles.push(TriangleIndex(face[0], face[k], face[k + 1]));
                }
            }
            _ => {}
        }
    }

    if triangles.is_empty() {
        bail!("No faces found");
    }
    Polyhedron::new(vertices, triangles)
}

/// Converts an OBJ index token to a 0-based vertex index.
fn resolve_index(token: &str, num_vertices: usize) -> Result<usize> {
    let first = token.split('/').next().unwrap_or(token);
    let index: i64 = first
        .parse()
        .with_context(|| format!("Invalid vertex index '{token}'"))?;
    let resolved = if index > 0 {
        index - 1
    } else if index < 0 {
        num_vertices as i64 + index
    } else {
        bail!("Vertex index 0 is not valid in OBJ");
    };
    if resolved < 0 || resolved as usize >= num_vertices {
        return Err(anyhow!(
            "Vertex index {index} out of range ({num_vertices} vertices defined)"
        ));
    }
    Ok(resolved as usize)
}
