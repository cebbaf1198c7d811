//! # Submission Handler
//!
//! Client side of `POST /generate`: reads a file and four scalar inputs from a
//! [`Host`] page, uploads them as multipart form data, and offers the returned
//! model as a download link.
//!
//! ## Flow
//!
//! ```text
//! idle ──activate──▶ validating ──file?──▶ awaiting response ──2xx──▶ link ready
//!                        │                        │
//!                        └── no file: alert       └── failure: alert
//! ```
//!
//! Only one request is in flight at a time. While it is outstanding the
//! trigger control is disabled and further activations return
//! [`Outcome::Busy`]. Each request carries a token; [`SubmissionHandler::cancel`]
//! retires the token so the late response is dropped as [`Outcome::Stale`].
//!
//! Every successful response gets a new object URL, and the previous one is
//! revoked first, so at most one generated blob stays alive.
//!
//! ## Example
//!
//! ```no_run
//! use hueforge::client::{ClientConfig, SubmissionHandler, TerminalHost};
//!
//! # async fn example() -> Result<(), hueforge::HueforgeError> {
//! let host = TerminalHost::from_path("photo.png", "200", "1.0", "0.2", "0.4")?;
//! let handler = SubmissionHandler::new(host, ClientConfig::new("http://127.0.0.1:8000"))?;
//! handler.activate().await?;
//! # Ok(())
//! # }
//! ```

mod host;
mod object_url;
mod terminal;

pub use host::{
    CONTROL_ID, DOWNLOAD_FILENAME, DOWNLOAD_LABEL, DownloadLink, ERROR_MESSAGE, FILE_INPUT_ID,
    Host, NO_FILE_MESSAGE, RESULT_ID, SCALAR_FIELDS, SelectedFile,
};
pub use object_url::{OBJECT_URL_PREFIX, ObjectUrls};
pub use terminal::TerminalHost;

use bytes::Bytes;
use reqwest::{
    StatusCode, Url,
    multipart::{Form, Part},
};
use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::HueforgeError;

/// Path of the generation endpoint, relative to the server root.
pub const GENERATE_PATH: &str = "/generate";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Give up on the request after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// How an activation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The model is available behind the link.
    Ready(DownloadLink),
    /// No file was selected; nothing was sent.
    MissingFile,
    /// The server answered with a non-success status.
    Rejected(StatusCode),
    /// Another request was still in flight; nothing was sent.
    Busy,
    /// The request was cancelled before its response arrived.
    Stale,
}

/// Published download state: the registry and the URL currently shown.
#[derive(Debug, Default)]
struct Published {
    urls: ObjectUrls,
    current: Option<String>,
}

/// Click handler for the generate control.
pub struct SubmissionHandler<H> {
    host: H,
    http: reqwest::Client,
    endpoint: Url,
    in_flight: AtomicBool,
    token: AtomicU64,
    published: Mutex<Published>,
}

impl<H: Host> SubmissionHandler<H> {
    pub fn new(host: H, config: ClientConfig) -> Result<Self, HueforgeError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            HueforgeError::Config(format!("Invalid server URL '{}': {}", config.base_url, e))
        })?;
        let endpoint = base
            .join(GENERATE_PATH)
            .map_err(|e| HueforgeError::Config(format!("Invalid endpoint URL: {}", e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| HueforgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host,
            http,
            endpoint,
            in_flight: AtomicBool::new(false),
            token: AtomicU64::new(0),
            published: Mutex::new(Published::default()),
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// True while a request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Drop the outstanding request, if any, and re-enable the control.
    ///
    /// The HTTP exchange itself keeps running until its future is dropped;
    /// its response is discarded when it arrives.
    pub fn cancel(&self) {
        if self.in_flight.load(Ordering::SeqCst) {
            self.token.fetch_add(1, Ordering::SeqCst);
            self.in_flight.store(false, Ordering::SeqCst);
            self.host.set_control_enabled(true);
            info!("[submit] Cancelled outstanding request");
        }
    }

    /// Bytes behind a link this handler produced, while it is still live.
    pub fn resolve(&self, href: &str) -> Option<Bytes> {
        self.published().urls.resolve(href)
    }

    /// Number of object URLs this handler holds.
    pub fn live_object_urls(&self) -> usize {
        self.published().urls.live_count()
    }

    /// Handle one activation of the control.
    ///
    /// Failures the user should hear about raise an alert on the host.
    /// Network-level failures additionally come back as
    /// [`HueforgeError::Http`].
    pub async fn activate(&self) -> Result<Outcome, HueforgeError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("[submit] Ignoring activation while a request is in flight");
            return Ok(Outcome::Busy);
        }

        let Some(file) = self.host.selected_file() else {
            self.in_flight.store(false, Ordering::SeqCst);
            self.host.alert(NO_FILE_MESSAGE);
            return Ok(Outcome::MissingFile);
        };

        let guard = InFlight::acquire(self);
        let form = self.build_form(file)?;

        info!(endpoint = %self.endpoint, token = guard.token, "[submit] Uploading");
        let sent = self.http.post(self.endpoint.clone()).multipart(form).send().await;

        if !guard.is_current() {
            debug!(token = guard.token, "[submit] Discarding response of cancelled request");
            return Ok(Outcome::Stale);
        }

        let response = match sent {
            Ok(response) => response,
            Err(e) => return Err(self.fail_network(guard, e)),
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "[submit] Generation rejected");
            drop(guard);
            self.host.alert(ERROR_MESSAGE);
            return Ok(Outcome::Rejected(status));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(_) if !guard.is_current() => {
                debug!(token = guard.token, "[submit] Discarding failed body of cancelled request");
                return Ok(Outcome::Stale);
            }
            Err(e) => return Err(self.fail_network(guard, e)),
        };

        if !guard.is_current() {
            debug!(token = guard.token, "[submit] Discarding response of cancelled request");
            return Ok(Outcome::Stale);
        }

        let link = self.publish(body);
        drop(guard);
        Ok(Outcome::Ready(link))
    }

    /// Multipart body: the file under `file`, then each scalar input verbatim.
    fn build_form(&self, file: SelectedFile) -> Result<Form, HueforgeError> {
        let mime = mime_guess::from_path(&file.name).first_or_octet_stream();
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name)
            .mime_str(mime.as_ref())
            .map_err(|e| HueforgeError::Http(format!("Invalid file type: {}", e)))?;

        let form = SCALAR_FIELDS
            .iter()
            .fold(Form::new().part("file", part), |form, &(element_id, key)| {
                form.text(key, self.host.field_value(element_id))
            });
        Ok(form)
    }

    fn fail_network(&self, guard: InFlight<'_, H>, e: reqwest::Error) -> HueforgeError {
        warn!(error = %e, "[submit] Request failed");
        drop(guard);
        self.host.alert(ERROR_MESSAGE);
        HueforgeError::Http(format!("Request to {} failed: {}", self.endpoint, e))
    }

    /// Swap in a new object URL for `body` and show it.
    fn publish(&self, body: Bytes) -> DownloadLink {
        let size = body.len();
        let href = {
            let mut published = self.published();
            if let Some(previous) = published.current.take() {
                published.urls.revoke(&previous);
            }
            let href = published.urls.create(body);
            published.current = Some(href.clone());
            href
        };

        let link = DownloadLink {
            href,
            download: DOWNLOAD_FILENAME.to_string(),
            text: DOWNLOAD_LABEL.to_string(),
        };
        info!(bytes = size, href = %link.href, "[submit] Model ready");
        self.host.replace_result(link.clone());
        link
    }

    fn published(&self) -> MutexGuard<'_, Published> {
        self.published.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Marks a request as outstanding; releases the control when dropped,
/// unless the request was cancelled in the meantime.
struct InFlight<'a, H: Host> {
    handler: &'a SubmissionHandler<H>,
    token: u64,
}

impl<'a, H: Host> InFlight<'a, H> {
    fn acquire(handler: &'a SubmissionHandler<H>) -> Self {
        let token = handler.token.fetch_add(1, Ordering::SeqCst) + 1;
        handler.host.set_control_enabled(false);
        Self { handler, token }
    }

    fn is_current(&self) -> bool {
        self.handler.token.load(Ordering::SeqCst) == self.token
    }
}

impl<H: Host> Drop for InFlight<'_, H> {
    fn drop(&mut self) {
        if self.is_current() {
            self.handler.in_flight.store(false, Ordering::SeqCst);
            self.handler.host.set_control_enabled(true);
        }
    }
}
