//! Capture driver
//!
//! Runs one capture end to end: create a view, load the URL, instrument the
//! page when its DOM becomes ready, wait for load-finished, then rasterize
//! the view and write it out as PNG.

use crate::bitmap::sha256_hex;
use crate::script::{ScriptValue, ValueKind};
use crate::signal::CancellationToken;
use crate::view::{Renderer, View};
use crate::{BitmapFormat, CaptureConfig, Error, Result, NATIVE_CALLBACK_VALUE};
use log::{debug, info, warn};
use serde::Serialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Native function bound into the page on DOM-ready. Arguments are ignored.
pub fn native_callback(_args: &[ScriptValue]) -> ScriptValue {
    ScriptValue::Number(NATIVE_CALLBACK_VALUE)
}

/// What the DOM-ready handler did to the page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DomReadyOutcome {
    /// The DOM query returned a string and the callback was wired in
    Instrumented {
        /// Length of the query result in UTF-16 code units
        dom_content_len: usize,
        /// Length of the namespace's `callbacks` list after wiring
        callbacks: usize,
    },
    /// The DOM query returned something other than a string
    Skipped { kind: ValueKind },
    /// This page context was instrumented before
    AlreadyInstrumented,
    /// The view has JavaScript turned off
    ScriptingDisabled,
}

/// Page instrumentation applied on DOM-ready
#[derive(Debug, Clone)]
pub struct Instrumentation {
    pub global_name: String,
    pub namespace: String,
    pub dom_query: String,
}

impl Instrumentation {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            global_name: config.global_name.clone(),
            namespace: config.namespace.clone(),
            dom_query: config.dom_query.clone(),
        }
    }

    // Lives on the page's global object, so a new navigation starts clean.
    fn marker(&self) -> String {
        format!("__rfcapture_instrumented_{}", self.global_name)
    }

    /// Instrument the page currently loaded in `view`.
    pub fn install(&self, view: &mut View) -> Result<DomReadyOutcome> {
        if !view.javascript_enabled() {
            return Ok(DomReadyOutcome::ScriptingDisabled);
        }
        let marker = self.marker();
        let ctx = view.script_context()?;
        if ctx.has_global(&marker)? {
            debug!("page already instrumented, skipping");
            return Ok(DomReadyOutcome::AlreadyInstrumented);
        }

        let content = match ctx.evaluate(&self.dom_query)? {
            ScriptValue::String(s) => s,
            other => {
                warn!(
                    "DOM query {:?} returned {}, not a string; page left uninstrumented",
                    self.dom_query,
                    other.kind()
                );
                return Ok(DomReadyOutcome::Skipped { kind: other.kind() });
            }
        };
        let dom_content_len = content.encode_utf16().count();
        info!("DOM content length: {}", dom_content_len);

        ctx.register_function(&self.global_name, native_callback)?;
        let callbacks = ctx.evaluate(&self.wiring_script())?;
        let callbacks = callbacks.as_number().map(|n| n as usize).ok_or_else(|| {
            Error::ScriptError(format!("{}.callbacks is not an array after wiring", self.namespace))
        })?;
        ctx.set_global(&marker, &ScriptValue::Boolean(true))?;

        debug!("{}.callbacks now holds {} entries", self.namespace, callbacks);
        Ok(DomReadyOutcome::Instrumented {
            dom_content_len,
            callbacks,
        })
    }

    // Appends to an existing namespace object instead of replacing it.
    fn wiring_script(&self) -> String {
        format!(
            r#"(function (g) {{
    var ns = g["{ns}"];
    if (ns === null || typeof ns !== "object") {{
        ns = {{}};
        g["{ns}"] = ns;
    }}
    if (!Array.isArray(ns.callbacks)) {{
        ns.callbacks = [];
    }}
    ns.callbacks.push({{ render: g["{global}"] }});
    return ns.callbacks.length;
}})(globalThis)"#,
            ns = self.namespace,
            global = self.global_name
        )
    }
}

/// Event record of one capture, shared with the view's callbacks
#[derive(Debug)]
pub struct CaptureEvents {
    instrumentation: Instrumentation,
    /// First DOM-ready outcome of the run
    pub dom_ready: Option<DomReadyOutcome>,
    pub dom_ready_events: u32,
    pub load_finished_events: u32,
    script_error: Option<Error>,
}

impl CaptureEvents {
    pub fn new(instrumentation: Instrumentation) -> Self {
        Self {
            instrumentation,
            dom_ready: None,
            dom_ready_events: 0,
            load_finished_events: 0,
            script_error: None,
        }
    }

    /// Load-finished handler. The view completes the load signal itself.
    pub fn on_load_finished(&mut self, view: &View) {
        self.load_finished_events += 1;
        info!("Page loaded: {}", view.url().unwrap_or("<unknown>"));
    }

    /// DOM-ready handler. Script errors are kept and surfaced once the
    /// wait is over.
    pub fn on_dom_ready(&mut self, view: &mut View) {
        self.dom_ready_events += 1;
        debug!("DOM ready: {}", view.url().unwrap_or("<unknown>"));
        match self.instrumentation.install(view) {
            Ok(outcome) => {
                if self.dom_ready.is_none() {
                    self.dom_ready = Some(outcome);
                }
            }
            Err(e) => {
                warn!("DOM-ready instrumentation failed: {}", e);
                if self.script_error.is_none() {
                    self.script_error = Some(e);
                }
            }
        }
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.script_error.take()
    }
}

/// Summary of one capture
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub url: String,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: BitmapFormat,
    pub png_bytes: usize,
    pub sha256: String,
    pub dom_ready: Option<DomReadyOutcome>,
    pub load_finished_events: u32,
    pub elapsed_ms: u64,
}

/// Drives captures with one renderer
pub struct CaptureDriver {
    config: CaptureConfig,
    renderer: Renderer,
    cancel: CancellationToken,
}

impl CaptureDriver {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        let renderer = Renderer::new(config.engine.clone())?;
        Ok(Self {
            config,
            renderer,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Token observed by every wait of this driver. Cancelling it aborts the
    /// current and all later captures.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Capture the configured URL to the configured output path.
    pub fn run(&mut self) -> Result<CaptureReport> {
        let url = self.config.url.clone();
        let output = self.config.output.clone();
        self.capture(&url, &output)
    }

    /// Capture `url` to `output`, overwriting it.
    pub fn capture(&mut self, url: &str, output: impl AsRef<Path>) -> Result<CaptureReport> {
        let output = output.as_ref();
        let started = Instant::now();
        let viewport = self.config.viewport;

        let mut view = self
            .renderer
            .create_view(viewport.width, viewport.height, self.config.transparent)?;
        view.set_pump_interval(Duration::from_millis(self.config.pump_interval_ms));

        let events = Rc::new(RefCell::new(CaptureEvents::new(Instrumentation::from_config(
            &self.config,
        ))));
        let on_finish = events.clone();
        view.set_finish_loading_callback(move |view| on_finish.borrow_mut().on_load_finished(view));
        let on_dom = events.clone();
        view.set_dom_ready_callback(move |view| on_dom.borrow_mut().on_dom_ready(view));

        let signal = view.load_url(url);
        view.wait_for(
            &signal,
            Duration::from_millis(self.config.load_timeout_ms),
            &self.cancel,
        )?;

        let mut events = events.borrow_mut();
        if let Some(err) = events.take_error() {
            return Err(err);
        }

        let bitmap = self.renderer.render(&view);
        let png = bitmap.write_png(output)?;
        let sha256 = sha256_hex(&png);
        info!(
            "wrote {} ({}x{}, {} bytes)",
            output.display(),
            bitmap.width(),
            bitmap.height(),
            png.len()
        );

        Ok(CaptureReport {
            url: view.url().unwrap_or(url).to_string(),
            output: output.to_path_buf(),
            width: bitmap.width(),
            height: bitmap.height(),
            format: bitmap.format(),
            png_bytes: png.len(),
            sha256,
            dom_ready: events.dom_ready.clone(),
            load_finished_events: events.load_finished_events,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
