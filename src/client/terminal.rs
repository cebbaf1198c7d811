//! A [`Host`] for the command line: inputs come from arguments, alerts go to
//! stderr, and the latest download link is kept for the caller to save.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::host::{DownloadLink, Host, SCALAR_FIELDS, SelectedFile};
use crate::error::HueforgeError;

#[derive(Debug)]
pub struct TerminalHost {
    file: Option<SelectedFile>,
    fields: HashMap<&'static str, String>,
    alerts: Mutex<Vec<String>>,
    result: Mutex<Option<DownloadLink>>,
}

impl TerminalHost {
    /// Build a host from an optional file and the four scalar texts, in
    /// `max_dim`, `scale_xy`, `z_scale`, `base_thickness` order.
    pub fn new(file: Option<SelectedFile>, values: [String; 4]) -> Self {
        let fields = SCALAR_FIELDS
            .iter()
            .map(|&(element_id, _)| element_id)
            .zip(values)
            .collect();
        Self {
            file,
            fields,
            alerts: Mutex::new(Vec::new()),
            result: Mutex::new(None),
        }
    }

    /// Read `path` from disk and use it as the selected file.
    pub fn from_path(
        path: impl AsRef<Path>,
        max_dim: &str,
        scale_xy: &str,
        z_scale: &str,
        base_thickness: &str,
    ) -> Result<Self, HueforgeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self::new(
            Some(SelectedFile::new(name, bytes)),
            [
                max_dim.to_string(),
                scale_xy.to_string(),
                z_scale.to_string(),
                base_thickness.to_string(),
            ],
        ))
    }

    /// The link currently shown, if any.
    pub fn result(&self) -> Option<DownloadLink> {
        self.result.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Messages raised so far.
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Host for TerminalHost {
    fn selected_file(&self) -> Option<SelectedFile> {
        self.file.clone()
    }

    fn field_value(&self, element_id: &str) -> String {
        self.fields.get(element_id).cloned().unwrap_or_default()
    }

    fn alert(&self, message: &str) {
        eprintln!("{}", message);
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }

    fn set_control_enabled(&self, enabled: bool) {
        debug!(enabled, "[terminal] control state");
    }

    fn replace_result(&self, link: DownloadLink) {
        *self.result.lock().unwrap_or_else(|e| e.into_inner()) = Some(link);
    }
}
