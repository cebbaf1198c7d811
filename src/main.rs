//! # HueForge CLI
//!
//! Command-line interface for turning images into relief STL models.
//!
//! ## Usage
//!
//! ```bash
//! # Convert an image locally
//! hueforge convert photo.png -o photo.stl --max-dim 200 --z-scale 3
//!
//! # Run the web UI and /generate endpoint
//! hueforge serve --listen 0.0.0.0:8000
//!
//! # Upload an image to a running server and save the result
//! hueforge submit photo.png --server http://127.0.0.1:8000 --max-dim 200
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use hueforge::{
    HueforgeError,
    client::{ClientConfig, DOWNLOAD_FILENAME, Outcome, SubmissionHandler, TerminalHost},
    heightmap::HeightmapParams,
    mesh::MeshParams,
    model::{self, ModelParams},
    server::{self, ServerConfig},
    stl::StlFormat,
    telemetry,
};

/// HueForge - image to relief STL
#[derive(Parser, Debug)]
#[command(name = "hueforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert an image file into an STL model
    Convert {
        /// Input image path
        input: PathBuf,

        /// Output STL file path
        #[arg(short, long, default_value = "out.stl")]
        out: PathBuf,

        /// Max image dimension (px, at most 1024)
        #[arg(long, default_value_t = 300)]
        max_dim: u32,

        /// Contrast factor around the mean
        #[arg(long, default_value_t = 1.0)]
        contrast: f32,

        /// Gaussian blur sigma
        #[arg(long, default_value_t = 0.0)]
        blur: f32,

        /// Make dark pixels tall instead of bright ones
        #[arg(long)]
        invert: bool,

        /// mm per pixel (X/Y)
        #[arg(long, default_value_t = 0.5)]
        scale_xy: f32,

        /// mm height for value 1.0
        #[arg(long, default_value_t = 10.0)]
        z_scale: f32,

        /// Base thickness (mm)
        #[arg(long, default_value_t = 2.0)]
        base_thickness: f32,

        /// Write binary STL instead of ASCII
        #[arg(long)]
        binary: bool,
    },

    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "HUEFORGE_LISTEN", default_value = "127.0.0.1:8000")]
        listen: String,

        /// Upload size limit in megabytes
        #[arg(long, env = "HUEFORGE_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,
    },

    /// Upload an image to a running server and save the generated model
    Submit {
        /// Image to upload
        file: PathBuf,

        /// Server root URL
        #[arg(long, env = "HUEFORGE_SERVER", default_value = "http://127.0.0.1:8000")]
        server: String,

        /// Sent verbatim as `max_dim`
        #[arg(long, default_value = "300")]
        max_dim: String,

        /// Sent verbatim as `scale_xy`
        #[arg(long, default_value = "0.5")]
        scale_xy: String,

        /// Sent verbatim as `z_scale`
        #[arg(long, default_value = "10")]
        z_scale: String,

        /// Sent verbatim as `base_thickness`
        #[arg(long, default_value = "2")]
        base_thickness: String,

        /// Where to save the model
        #[arg(short, long, default_value = DOWNLOAD_FILENAME)]
        out: PathBuf,

        /// Give up after this many seconds (waits forever if omitted)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), HueforgeError> {
    let cli = Cli::parse();
    telemetry::init()?;

    match cli.command {
        Commands::Convert {
            input,
            out,
            max_dim,
            contrast,
            blur,
            invert,
            scale_xy,
            z_scale,
            base_thickness,
            binary,
        } => {
            let params = ModelParams {
                heightmap: HeightmapParams {
                    max_dim,
                    contrast,
                    blur,
                    invert,
                },
                mesh: MeshParams {
                    scale_xy,
                    z_scale,
                    base_thickness,
                },
                format: if binary {
                    StlFormat::Binary
                } else {
                    StlFormat::Ascii
                },
            };

            let bytes = std::fs::read(&input)?;
            let generated = model::generate(&bytes, &params)?;
            std::fs::write(&out, &generated.stl)?;

            info!(
                grid = %format!("{}x{}", generated.grid_width, generated.grid_height),
                triangles = generated.triangles,
                "converted {}",
                input.display()
            );
            println!("Wrote: {}", out.display());
        }

        Commands::Serve {
            listen,
            max_upload_mb,
        } => {
            let config = ServerConfig {
                listen_addr: listen,
                max_upload_bytes: max_upload_mb * 1024 * 1024,
            };
            tokio_runtime()?.block_on(server::serve(config))?;
        }

        Commands::Submit {
            file,
            server,
            max_dim,
            scale_xy,
            z_scale,
            base_thickness,
            out,
            timeout_secs,
        } => {
            let host = TerminalHost::from_path(&file, &max_dim, &scale_xy, &z_scale, &base_thickness)?;
            let mut config = ClientConfig::new(server);
            if let Some(secs) = timeout_secs {
                config = config.with_timeout(Duration::from_secs(secs));
            }
            let handler = SubmissionHandler::new(host, config)?;

            match tokio_runtime()?.block_on(handler.activate())? {
                Outcome::Ready(link) => {
                    let body = handler.resolve(&link.href).ok_or_else(|| {
                        HueforgeError::Http("download link was revoked".to_string())
                    })?;
                    std::fs::write(&out, &body)?;
                    println!("Wrote: {} ({} bytes)", out.display(), body.len());
                }
                Outcome::Rejected(status) => {
                    return Err(HueforgeError::Http(format!(
                        "server rejected the request with {}",
                        status
                    )));
                }
                other => {
                    return Err(HueforgeError::Http(format!(
                        "no model produced ({:?})",
                        other
                    )));
                }
            }
        }
    }

    Ok(())
}

fn tokio_runtime() -> Result<tokio::runtime::Runtime, HueforgeError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| HueforgeError::Config(format!("Failed to start async runtime: {}", e)))
}
