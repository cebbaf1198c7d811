//! # Model Generation
//!
//! Glues [`heightmap`](crate::heightmap), [`mesh`](crate::mesh) and
//! [`stl`](crate::stl) into one call, shared by the HTTP handler and the CLI.

use std::time::Instant;
use tracing::debug;

use crate::{
    error::HueforgeError,
    heightmap::{self, HeightmapParams},
    mesh::{self, MeshParams},
    stl::{self, StlFormat},
};

/// Every knob that influences the generated model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelParams {
    pub heightmap: HeightmapParams,
    pub mesh: MeshParams,
    pub format: StlFormat,
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), HueforgeError> {
        self.heightmap.validate()?;
        self.mesh.validate()
    }
}

/// A generated model and some facts about it.
#[derive(Debug, Clone)]
pub struct GeneratedModel {
    pub stl: Vec<u8>,
    pub grid_width: usize,
    pub grid_height: usize,
    pub triangles: usize,
}

/// Decode `image_bytes` and produce STL data.
///
/// CPU bound; call it from a blocking context.
pub fn generate(image_bytes: &[u8], params: &ModelParams) -> Result<GeneratedModel, HueforgeError> {
    params.validate()?;
    let started = Instant::now();

    let img = heightmap::load_image(image_bytes)?;
    let hm = heightmap::image_to_heightmap(&img, &params.heightmap)?;
    let mesh = mesh::heightmap_to_mesh(&hm, &params.mesh)?;
    let stl = stl::to_bytes(&mesh, params.format)?;

    debug!(
        source_width = img.width(),
        source_height = img.height(),
        grid_width = hm.width(),
        grid_height = hm.height(),
        triangles = mesh.len(),
        bytes = stl.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "generated model"
    );

    Ok(GeneratedModel {
        stl,
        grid_width: hm.width(),
        grid_height: hm.height(),
        triangles: mesh.len(),
    })
}
