//! `POST /generate` - turn an uploaded image into an STL download.

use axum::{
    Json,
    extract::Multipart,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::HueforgeError,
    heightmap::HeightmapParams,
    mesh::MeshParams,
    model::{self, ModelParams},
    stl::{STL_MIME, StlFormat},
};

/// JSON body of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Map library errors onto HTTP statuses.
fn status_for(err: &HueforgeError) -> StatusCode {
    match err {
        HueforgeError::Image(_) => StatusCode::BAD_REQUEST,
        HueforgeError::InvalidParameter(_) | HueforgeError::Mesh(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Uploaded file plus the raw text of every other field.
#[derive(Debug, Default)]
pub struct GenerateForm {
    pub file_name: Option<String>,
    pub file: Option<Vec<u8>>,
    pub fields: HashMap<String, String>,
}

impl GenerateForm {
    /// Parse the scalar fields, falling back to defaults for absent or empty ones.
    pub fn params(&self) -> Result<ModelParams, HueforgeError> {
        let hm_defaults = HeightmapParams::default();
        let mesh_defaults = MeshParams::default();

        let params = ModelParams {
            heightmap: HeightmapParams {
                max_dim: self.number("max_dim", hm_defaults.max_dim)?,
                contrast: self.number("contrast", hm_defaults.contrast)?,
                blur: self.number("blur", hm_defaults.blur)?,
                invert: self.flag("invert", hm_defaults.invert)?,
            },
            mesh: MeshParams {
                scale_xy: self.number("scale_xy", mesh_defaults.scale_xy)?,
                z_scale: self.number("z_scale", mesh_defaults.z_scale)?,
                base_thickness: self.number("base_thickness", mesh_defaults.base_thickness)?,
            },
            format: match self.text("format") {
                Some(s) => s.parse()?,
                None => StlFormat::default(),
            },
        };
        params.validate()?;
        Ok(params)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> Result<T, HueforgeError> {
        match self.text(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                HueforgeError::InvalidParameter(format!("invalid value for {}: '{}'", key, raw))
            }),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, HueforgeError> {
        match self.text(key).map(str::to_lowercase).as_deref() {
            None => Ok(default),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some("false" | "0" | "no" | "off") => Ok(false),
            Some(raw) => Err(HueforgeError::InvalidParameter(format!(
                "invalid value for {}: '{}'",
                key, raw
            ))),
        }
    }
}

/// Drain the multipart stream into a [`GenerateForm`].
async fn read_form(multipart: &mut Multipart) -> Result<GenerateForm, ApiError> {
    let mut form = GenerateForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            form.file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| api_error(e.status(), format!("Failed to read file: {}", e)))?;
            form.file = Some(bytes.to_vec());
        } else {
            let text = field.text().await.map_err(|e| {
                api_error(e.status(), format!("Failed to read field {}: {}", name, e))
            })?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

/// POST /generate - Upload an image, get an STL back.
pub async fn generate(mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut form = read_form(&mut multipart).await?;

    let image_bytes = form
        .file
        .take()
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No file field found"))?;

    let params = form
        .params()
        .map_err(|e| api_error(status_for(&e), e.to_string()))?;

    let file_name = form.file_name.unwrap_or_else(|| "unknown".to_string());

    info!(
        file = %file_name,
        upload_bytes = image_bytes.len(),
        max_dim = params.heightmap.max_dim,
        scale_xy = params.mesh.scale_xy,
        z_scale = params.mesh.z_scale,
        base_thickness = params.mesh.base_thickness,
        "[generate] Request"
    );

    // Move CPU-intensive work to blocking thread pool
    let generated = tokio::task::spawn_blocking(move || model::generate(&image_bytes, &params))
        .await
        .map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Processing error: {}", e),
            )
        })?
        .map_err(|e| {
            warn!(file = %file_name, error = %e, "[generate] Failed");
            api_error(status_for(&e), e.to_string())
        })?;

    info!(
        triangles = generated.triangles,
        bytes = generated.stl.len(),
        "[generate] Model ready"
    );

    let disposition = format!(
        "attachment; filename=\"hueforge_{}.stl\"",
        Uuid::new_v4().simple()
    );
    Ok((
        [
            (header::CONTENT_TYPE, STL_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        generated.stl,
    )
        .into_response())
}
