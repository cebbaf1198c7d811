//! # STL Writers
//!
//! Serializes a [`Mesh`] as stereolithography data.
//!
//! ## ASCII
//!
//! ```text
//! solid hueforge_model
//!  facet normal 0 0 1
//!   outer loop
//!    vertex 0 0 0
//!    vertex 0.5 0 0
//!    vertex 0.5 0.5 0
//!   endloop
//!  endfacet
//! endsolid hueforge_model
//! ```
//!
//! ## Binary
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 80 | Header, zeroed (ignored by readers) |
//! | 80 | 4 | Triangle count, little-endian `u32` |
//! | 84 | 50 × n | Normal, three vertices (12 × `f32`), 2-byte attribute |

use std::io::{self, Write};
use std::str::FromStr;

use crate::{
    error::HueforgeError,
    mesh::{Mesh, Triangle},
};

/// Solid name used in ASCII output.
pub const SOLID_NAME: &str = "hueforge_model";

/// MIME type served for generated models.
pub const STL_MIME: &str = "application/sla";

/// Size of one facet record in binary STL.
pub const BINARY_FACET_BYTES: usize = 50;

/// Size of the binary STL preamble (header + count).
pub const BINARY_HEADER_BYTES: usize = 84;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StlFormat {
    #[default]
    Ascii,
    Binary,
}

impl FromStr for StlFormat {
    type Err = HueforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ascii" | "text" => Ok(StlFormat::Ascii),
            "binary" | "bin" => Ok(StlFormat::Binary),
            other => Err(HueforgeError::InvalidParameter(format!(
                "unknown STL format '{}', expected 'ascii' or 'binary'",
                other
            ))),
        }
    }
}

/// Write `mesh` in the requested format.
pub fn write_stl<W: Write>(out: &mut W, mesh: &Mesh, format: StlFormat) -> io::Result<()> {
    match format {
        StlFormat::Ascii => write_ascii(out, mesh, SOLID_NAME),
        StlFormat::Binary => write_binary(out, mesh),
    }
}

/// Serialize `mesh` to an in-memory buffer.
pub fn to_bytes(mesh: &Mesh, format: StlFormat) -> io::Result<Vec<u8>> {
    let capacity = match format {
        StlFormat::Ascii => mesh.len() * 160,
        StlFormat::Binary => BINARY_HEADER_BYTES + mesh.len() * BINARY_FACET_BYTES,
    };
    let mut buf = Vec::with_capacity(capacity);
    write_stl(&mut buf, mesh, format)?;
    Ok(buf)
}

pub fn write_ascii<W: Write>(out: &mut W, mesh: &Mesh, solid_name: &str) -> io::Result<()> {
    writeln!(out, "solid {}", solid_name)?;
    for tri in &mesh.triangles {
        let [nx, ny, nz] = tri.normal.0;
        writeln!(out, " facet normal {} {} {}", nx, ny, nz)?;
        writeln!(out, "  outer loop")?;
        for v in &tri.vertices {
            writeln!(out, "   vertex {} {} {}", v.0[0], v.0[1], v.0[2])?;
        }
        writeln!(out, "  endloop")?;
        writeln!(out, " endfacet")?;
    }
    writeln!(out, "endsolid {}", solid_name)
}

/// Binary STL through `stl_io`, which writes a zeroed header.
pub fn write_binary<W: Write>(out: &mut W, mesh: &Mesh) -> io::Result<()> {
    if u32::try_from(mesh.len()).is_err() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "too many triangles for STL",
        ));
    }
    stl_io::write_stl(out, mesh.triangles.iter().map(to_stl_triangle))
}

fn to_stl_triangle(tri: &Triangle) -> stl_io::Triangle {
    let [a, b, c] = tri.vertices;
    stl_io::Triangle {
        normal: stl_io::Normal::new(tri.normal.0),
        vertices: [
            stl_io::Vertex::new(a.0),
            stl_io::Vertex::new(b.0),
            stl_io::Vertex::new(c.0),
        ],
    }
}
