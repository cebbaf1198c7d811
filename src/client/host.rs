//! The page a [`SubmissionHandler`](super::SubmissionHandler) is bound to.

use bytes::Bytes;

/// Element id of the trigger control.
pub const CONTROL_ID: &str = "go";
/// Element id of the file picker.
pub const FILE_INPUT_ID: &str = "file";
/// Element id of the container that receives the download link.
pub const RESULT_ID: &str = "result";

/// Scalar inputs: `(element id, multipart key)`, in submission order.
pub const SCALAR_FIELDS: [(&str, &str); 4] = [
    ("maxdim", "max_dim"),
    ("scalexy", "scale_xy"),
    ("zscale", "z_scale"),
    ("base", "base_thickness"),
];

/// Text shown when the control is activated without a file.
pub const NO_FILE_MESSAGE: &str = "choose file";
/// Text shown for every failed generation.
pub const ERROR_MESSAGE: &str = "error";

/// Filename offered for the generated model.
pub const DOWNLOAD_FILENAME: &str = "hueforge_model.stl";
/// Label of the download link.
pub const DOWNLOAD_LABEL: &str = "Download STL";

/// The file currently chosen in the file picker.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// An anchor offering a blob for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    /// Object URL of the blob.
    pub href: String,
    /// Suggested filename.
    pub download: String,
    pub text: String,
}

/// Everything the handler needs from the surrounding page.
///
/// Reads happen at activation time, so implementations should return the
/// live value of each input rather than a snapshot taken earlier.
pub trait Host: Send + Sync {
    /// The file chosen in the file picker, if any.
    fn selected_file(&self) -> Option<SelectedFile>;

    /// Raw text of the input with the given element id. Missing inputs read
    /// as an empty string.
    fn field_value(&self, element_id: &str) -> String;

    /// Show a blocking message to the user.
    fn alert(&self, message: &str);

    /// Enable or disable the trigger control.
    fn set_control_enabled(&self, enabled: bool);

    /// Clear the result container and insert `link` as its only child.
    fn replace_result(&self, link: DownloadLink);
}
