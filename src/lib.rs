//! RFox Capture
//!
//! A headless page capture engine for Rust: it creates an offscreen view,
//! loads a URL, waits for the DOM-ready and load-finished events, injects a
//! native callback into the page's script environment and rasterizes the
//! view to a PNG file.
//!
//! # Features
//!
//! - **Pure-Rust engine surface**: network loading with `reqwest`, HTML
//!   parsing with `scraper`, page scripting with Boa, PNG export with `png`
//! - **Manual event pump**: views advance only when `View::update` is called,
//!   and loads are observed through an explicit `LoadSignal`
//! - **Bounded waits**: every wait carries a timeout and a cancellation token
//!
//! # Example
//!
//! ```no_run
//! use rfcapture::{CaptureConfig, CaptureDriver, Viewport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaptureConfig {
//!     url: "https://example.com".to_string(),
//!     output: "example.png".into(),
//!     viewport: Viewport { width: 1280, height: 768 },
//!     ..Default::default()
//! };
//!
//! let mut driver = CaptureDriver::new(config)?;
//! let report = driver.run()?;
//! println!("wrote {} bytes to {}", report.png_bytes, report.output.display());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod bitmap;
pub mod dom;
pub mod driver;
pub mod loader;
pub mod rendering;
pub mod script;
pub mod signal;
pub mod view;

// Async-friendly facade (worker-thread backed)
pub mod async_api;

pub use bitmap::{Bitmap, BitmapFormat};
pub use driver::{native_callback, CaptureDriver, CaptureEvents, CaptureReport, DomReadyOutcome, Instrumentation};
pub use script::{ScriptContext, ScriptValue, ValueKind};
pub use signal::{CancellationToken, LoadSignal, LoadStatus};
pub use view::{LoadState, Renderer, View, ViewCallback};

/// Value returned by the native callback injected on DOM-ready.
pub const NATIVE_CALLBACK_VALUE: f64 = 1123.0;

/// Configuration for the renderer
///
/// These are the knobs of the engine itself (network and scripting). The
/// defaults are conservative: JavaScript runs with a loop-iteration and a
/// recursion limit so a hostile page cannot hang the DOM-ready handler.
///
/// # Examples
///
/// ```
/// let cfg = rfcapture::EngineConfig::default();
/// assert!(cfg.user_agent.contains("RFOX"));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// User agent string to send with requests
    pub user_agent: String,
    /// Timeout for network requests in milliseconds
    pub timeout_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
    /// Whether to enable JavaScript execution
    pub enable_javascript: bool,
    /// Maximum loop iterations before Boa throws an error (0 => disabled)
    pub script_loop_iteration_limit: u64,
    /// Maximum recursion depth before Boa throws (usize::MAX => disabled)
    pub script_recursion_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/115.0 RFOX/0.3".to_string(),
            timeout_ms: 30000,
            headers: HashMap::new(),
            enable_javascript: true,
            script_loop_iteration_limit: 1000000,
            script_recursion_limit: 1024,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 768,
        }
    }
}

/// Configuration for a capture run
///
/// One `CaptureConfig` describes one "program": which URL to load, where the
/// PNG goes, and how the page is instrumented when its DOM becomes ready.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// URL to load
    pub url: String,
    /// Path of the PNG written at the end of the run (overwritten if present)
    pub output: PathBuf,
    /// View dimensions
    pub viewport: Viewport,
    /// Whether the view background is transparent
    pub transparent: bool,
    /// Upper bound on the wait for load-finished, in milliseconds
    pub load_timeout_ms: u64,
    /// Sleep between two pumps of the view while waiting, in milliseconds
    pub pump_interval_ms: u64,
    /// Global identifier the native callback is bound to
    pub global_name: String,
    /// Page-global object whose `callbacks` list receives the native callback
    pub namespace: String,
    /// Script expression evaluated against the DOM on DOM-ready
    pub dom_query: String,
    /// Renderer configuration
    pub engine: EngineConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            url: "https://google.com".to_string(),
            output: PathBuf::from("output.png"),
            viewport: Viewport::default(),
            transparent: false,
            load_timeout_ms: 30000,
            pump_interval_ms: 1,
            global_name: "xxxx".to_string(),
            namespace: "xxx".to_string(),
            dom_query: "document.body.innerHTML".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl CaptureConfig {
    /// Check the configuration before any engine resource is created.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.load_timeout_ms == 0 {
            return Err(Error::ConfigError("load timeout must be greater than zero".into()));
        }
        if !is_js_identifier(&self.global_name) {
            return Err(Error::ConfigError(format!("invalid global name: {:?}", self.global_name)));
        }
        if !is_js_identifier(&self.namespace) {
            return Err(Error::ConfigError(format!("invalid namespace: {:?}", self.namespace)));
        }
        if self.global_name == self.namespace {
            return Err(Error::ConfigError("global name and namespace must differ".into()));
        }
        if self.dom_query.trim().is_empty() {
            return Err(Error::ConfigError("DOM query must not be empty".into()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::ConfigError("output path must not be empty".into()));
        }
        Ok(())
    }
}

/// ASCII JavaScript identifier check (no reserved-word filtering).
pub(crate) fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
