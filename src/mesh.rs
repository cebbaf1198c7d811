//! # Watertight Relief Mesh
//!
//! Turns a [`Heightmap`] into a closed triangle mesh that slicers accept
//! without repair.
//!
//! ## Layout
//!
//! ```text
//!            top surface (2 triangles per grid cell)
//!        ┌─────────────────────────────┐  z = h * z_scale
//!        │╲ │╲ │╲ │╲ │╲ │╲ │╲ │╲ │╲  │
//!  wall  │                             │  wall
//!        └─────────────────────────────┘  z = -base_thickness
//!            bottom (fan from the centre)
//! ```
//!
//! Grid vertex `(row, col)` sits at `(col * scale_xy, row * scale_xy)`.
//! Walls follow the outer perimeter of the grid, so every wall edge meets
//! exactly one top-surface edge and one bottom-fan edge. Every triangle is
//! wound counter-clockwise when seen from outside the solid.

use rayon::prelude::*;
use std::ops::{Mul, Sub};

use crate::{error::HueforgeError, heightmap::Heightmap};

/// Parameters controlling the physical size of the model, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshParams {
    /// Distance between neighbouring grid points in X and Y.
    pub scale_xy: f32,
    /// Height of the top surface for a heightmap value of 1.0.
    pub z_scale: f32,
    /// Thickness of the flat base below z = 0.
    pub base_thickness: f32,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            scale_xy: 0.5,
            z_scale: 10.0,
            base_thickness: 2.0,
        }
    }
}

impl MeshParams {
    pub fn validate(&self) -> Result<(), HueforgeError> {
        if !self.scale_xy.is_finite() || self.scale_xy <= 0.0 {
            return Err(HueforgeError::InvalidParameter(format!(
                "scale_xy must be a positive number, got {}",
                self.scale_xy
            )));
        }
        if !self.z_scale.is_finite() {
            return Err(HueforgeError::InvalidParameter(format!(
                "z_scale must be finite, got {}",
                self.z_scale
            )));
        }
        if !self.base_thickness.is_finite() {
            return Err(HueforgeError::InvalidParameter(format!(
                "base_thickness must be finite, got {}",
                self.base_thickness
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3(pub [f32; 3]);

impl Vec3 {
    pub const ZERO: Vec3 = Vec3([0.0, 0.0, 0.0]);

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self([x, y, z])
    }

    pub fn x(self) -> f32 {
        self.0[0]
    }

    pub fn y(self) -> f32 {
        self.0[1]
    }

    pub fn z(self) -> f32 {
        self.0[2]
    }

    pub fn cross(self, rhs: Vec3) -> Vec3 {
        let [ax, ay, az] = self.0;
        let [bx, by, bz] = rhs.0;
        Vec3([ay * bz - az * by, az * bx - ax * bz, ax * by - ay * bx])
    }

    pub fn length(self) -> f32 {
        let [x, y, z] = self.0;
        (x * x + y * y + z * z).sqrt()
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3([self.0[0] - rhs.0[0], self.0[1] - rhs.0[1], self.0[2] - rhs.0[2]])
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3([self.0[0] * rhs, self.0[1] * rhs, self.0[2] * rhs])
    }
}

/// A single facet with its unit normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub normal: Vec3,
    pub vertices: [Vec3; 3],
}

impl Triangle {
    /// Build a facet, deriving the normal from the winding order.
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            normal: face_normal(a, b, c),
            vertices: [a, b, c],
        }
    }
}

/// Unit normal of `(a, b, c)`, or zero for degenerate triangles.
pub fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let n = (b - a).cross(c - a);
    let len = n.length();
    if len == 0.0 { Vec3::ZERO } else { n * (1.0 / len) }
}

/// A triangle soup ready to be written as STL.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Number of triangles [`heightmap_to_mesh`] produces for a `width x height` grid.
pub fn expected_triangle_count(width: usize, height: usize) -> usize {
    let perimeter = 2 * (width - 1) + 2 * (height - 1);
    2 * (width - 1) * (height - 1) + 2 * perimeter + perimeter
}

/// Build a closed relief mesh from a heightmap.
pub fn heightmap_to_mesh(heightmap: &Heightmap, params: &MeshParams) -> Result<Mesh, HueforgeError> {
    params.validate()?;

    let (w, h) = (heightmap.width(), heightmap.height());
    if w < 2 || h < 2 {
        return Err(HueforgeError::Mesh(format!(
            "heightmap must be at least 2x2 to form a solid, got {}x{}",
            w, h
        )));
    }

    let s = params.scale_xy;
    let top = |row: usize, col: usize| {
        Vec3::new(
            col as f32 * s,
            row as f32 * s,
            heightmap.get(row, col) * params.z_scale,
        )
    };

    let mut triangles: Vec<Triangle> = (0..h - 1)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..w - 1).flat_map(move |col| {
                let v00 = top(row, col);
                let v01 = top(row, col + 1);
                let v10 = top(row + 1, col);
                let v11 = top(row + 1, col + 1);
                [Triangle::new(v00, v01, v11), Triangle::new(v00, v11, v10)]
            })
        })
        .collect();

    let zb = -params.base_thickness.abs();
    let perimeter = perimeter_indices(w, h);
    let center = Vec3::new((w - 1) as f32 * s / 2.0, (h - 1) as f32 * s / 2.0, zb);
    let base = |v: Vec3| Vec3::new(v.x(), v.y(), zb);

    triangles.reserve(perimeter.len() * 3);
    for (k, &(r0, c0)) in perimeter.iter().enumerate() {
        let (r1, c1) = perimeter[(k + 1) % perimeter.len()];
        let t0 = top(r0, c0);
        let t1 = top(r1, c1);
        let b0 = base(t0);
        let b1 = base(t1);

        triangles.push(Triangle::new(b0, b1, t1));
        triangles.push(Triangle::new(b0, t1, t0));
        triangles.push(Triangle::new(center, b1, b0));
    }

    Ok(Mesh { triangles })
}

/// Grid positions around the outer edge, counter-clockwise seen from +Z:
/// first row left to right, last column, last row right to left, first column.
fn perimeter_indices(w: usize, h: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(2 * (w - 1) + 2 * (h - 1));
    out.extend((0..w).map(|col| (0, col)));
    out.extend((1..h).map(|row| (row, w - 1)));
    out.extend((0..w - 1).rev().map(|col| (h - 1, col)));
    out.extend((1..h - 1).rev().map(|row| (row, 0)));
    out
}
