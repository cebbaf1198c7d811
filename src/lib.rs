//! # HueForge - Image to Relief STL
//!
//! HueForge turns a picture into a printable relief: bright pixels become
//! tall, dark pixels stay low, and the whole thing sits on a flat base. It
//! provides:
//!
//! - **Heightmaps**: image decoding, downscaling, contrast, blur, inversion
//! - **Meshes**: closed relief meshes with side walls and a bottom
//! - **STL output**: ASCII and binary writers
//! - **Server**: an upload page and a `POST /generate` endpoint
//! - **Client**: the submission handler that talks to `/generate`
//!
//! ## Quick Start
//!
//! ```no_run
//! use hueforge::{
//!     heightmap::{self, HeightmapParams},
//!     mesh::{self, MeshParams},
//!     stl::{self, StlFormat},
//! };
//!
//! let bytes = std::fs::read("photo.png")?;
//! let img = heightmap::load_image(&bytes)?;
//! let hm = heightmap::image_to_heightmap(&img, &HeightmapParams::default())?;
//! let mesh = mesh::heightmap_to_mesh(&hm, &MeshParams::default())?;
//!
//! let mut out = std::fs::File::create("photo.stl")?;
//! stl::write_stl(&mut out, &mesh, StlFormat::Ascii)?;
//!
//! # Ok::<(), hueforge::error::HueforgeError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`heightmap`] | Image to height grid |
//! | [`mesh`] | Height grid to closed triangle mesh |
//! | [`stl`] | STL serialization |
//! | [`model`] | The whole pipeline in one call |
//! | [`server`] | HTTP server |
//! | [`client`] | Submission handler for `/generate` |
//! | [`error`] | Error types |

pub mod client;
pub mod error;
pub mod heightmap;
pub mod mesh;
pub mod model;
pub mod server;
pub mod stl;
pub mod telemetry;

// Re-exports for convenience
pub use error::HueforgeError;
pub use model::ModelParams;
