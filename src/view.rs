//! Renderer and views.
//!
//! A `Renderer` holds the engine configuration and the HTTP client; it
//! creates `View`s and rasterizes them. A `View` is an offscreen page: it
//! advances its load state machine only when the host calls `update()`, and
//! fires its DOM-ready and load-finished callbacks from inside that call.

use crate::dom::Document;
use crate::loader::{self, Resource};
use crate::script::{ScriptContext, ScriptValue};
use crate::signal::{CancellationToken, LoadSignal, LoadStatus};
use crate::{rendering, Bitmap, EngineConfig, Error, Result, Viewport};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Event callback invoked with the view that fired it
pub type ViewCallback = Box<dyn FnMut(&mut View)>;

/// Load state of a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing loaded yet
    Idle,
    /// Waiting for the loader thread
    Loading,
    /// Document parsed and scriptable; load-finished fires on the next update
    DomReady,
    /// Terminal state of a successful load
    Loaded,
    /// The load failed
    Failed(String),
}

/// Factory for views
pub struct Renderer {
    config: EngineConfig,
    client: Client,
}

impl Renderer {
    pub fn new(config: EngineConfig) -> Result<Self> {
        if config.timeout_ms == 0 {
            return Err(Error::InitializationError("network timeout must be greater than zero".into()));
        }
        let client = loader::build_client(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create an offscreen view of `width` x `height` pixels.
    pub fn create_view(&self, width: u32, height: u32, transparent: bool) -> Result<View> {
        if width == 0 || height == 0 {
            return Err(Error::ConfigError(format!("view must be non-empty, got {}x{}", width, height)));
        }
        Ok(View {
            viewport: Viewport { width, height },
            transparent,
            config: self.config.clone(),
            client: self.client.clone(),
            state: LoadState::Idle,
            url: None,
            pending: None,
            signal: None,
            document: None,
            script: None,
            script_error: None,
            pump_interval: Duration::from_millis(1),
            on_dom_ready: None,
            on_finish_loading: None,
        })
    }

    /// Rasterize the view's current frame.
    pub fn render(&self, view: &View) -> Bitmap {
        match &view.document {
            Some(doc) => rendering::render_document(doc, view.viewport, view.transparent),
            None => {
                debug!("rendering view without a document");
                rendering::render_blank(view.viewport, view.transparent)
            }
        }
    }
}

/// Offscreen page
pub struct View {
    viewport: Viewport,
    transparent: bool,
    config: EngineConfig,
    client: Client,
    state: LoadState,
    url: Option<String>,
    pending: Option<Receiver<Result<Resource>>>,
    signal: Option<LoadSignal>,
    document: Option<Document>,
    script: Option<ScriptContext>,
    /// Why the page has no script context despite a loaded document
    script_error: Option<String>,
    pump_interval: Duration,
    on_dom_ready: Option<ViewCallback>,
    on_finish_loading: Option<ViewCallback>,
}

impl View {
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// URL of the current (or in-flight) navigation
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Sleep between two pumps in `wait_for`. Zero spins.
    pub fn set_pump_interval(&mut self, interval: Duration) {
        self.pump_interval = interval;
    }

    pub fn javascript_enabled(&self) -> bool {
        self.config.enable_javascript
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading | LoadState::DomReady)
    }

    pub fn set_dom_ready_callback<F>(&mut self, cb: F)
    where
        F: FnMut(&mut View) + 'static,
    {
        self.on_dom_ready = Some(Box::new(cb));
    }

    pub fn clear_dom_ready_callback(&mut self) {
        self.on_dom_ready = None;
    }

    pub fn set_finish_loading_callback<F>(&mut self, cb: F)
    where
        F: FnMut(&mut View) + 'static,
    {
        self.on_finish_loading = Some(Box::new(cb));
    }

    pub fn clear_finish_loading_callback(&mut self) {
        self.on_finish_loading = None;
    }

    /// Start loading `url`. The returned signal completes when the
    /// load-finished event fires. A previous in-flight load is superseded.
    pub fn load_url(&mut self, url: &str) -> LoadSignal {
        if let Some(old) = self.signal.take() {
            old.fail(format!("superseded by navigation to {}", url));
        }
        info!("loading {}", url);

        let signal = LoadSignal::new();
        self.pending = Some(loader::spawn_load(self.client.clone(), self.config.clone(), url.to_string()));
        self.signal = Some(signal.clone());
        self.url = Some(url.to_string());
        self.document = None;
        self.script = None;
        self.script_error = None;
        self.state = LoadState::Loading;
        signal
    }

    /// Advance the load state machine by at most one step.
    pub fn update(&mut self) {
        match self.state {
            LoadState::Loading => {
                let received = match &self.pending {
                    Some(rx) => rx.try_recv(),
                    None => Err(TryRecvError::Disconnected),
                };
                match received {
                    Ok(Ok(resource)) => {
                        self.pending = None;
                        self.enter_dom_ready(resource);
                    }
                    Ok(Err(e)) => {
                        self.pending = None;
                        let reason = match e {
                            Error::LoadError(msg) => msg,
                            other => other.to_string(),
                        };
                        self.fail(reason);
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        self.pending = None;
                        self.fail("loader exited without a result".to_string());
                    }
                }
            }
            LoadState::DomReady => self.enter_loaded(),
            _ => {}
        }
    }

    /// Pump `update()` until `signal` resolves, the timeout elapses or the
    /// token is cancelled.
    pub fn wait_for(
        &mut self,
        signal: &LoadSignal,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.update();
            match signal.status() {
                LoadStatus::Completed => return Ok(()),
                LoadStatus::Failed(reason) => return Err(Error::LoadError(reason)),
                LoadStatus::Pending => {}
            }
            if Instant::now() >= deadline {
                warn!("load of {} did not finish within {}ms", self.url.as_deref().unwrap_or("<none>"), timeout.as_millis());
                return Err(Error::Timeout(timeout.as_millis() as u64));
            }
            if !self.pump_interval.is_zero() {
                std::thread::sleep(self.pump_interval);
            }
        }
    }

    /// Evaluate script in the page.
    pub fn evaluate_script(&mut self, source: &str) -> Result<ScriptValue> {
        self.script_context()?.evaluate(source)
    }

    /// The page's script context, available from DOM-ready on.
    pub fn script_context(&mut self) -> Result<&mut ScriptContext> {
        if !self.config.enable_javascript {
            return Err(Error::ScriptError("JavaScript is disabled in config".into()));
        }
        if let Some(reason) = &self.script_error {
            return Err(Error::ScriptError(reason.clone()));
        }
        self.script
            .as_mut()
            .ok_or_else(|| Error::ScriptError("No document loaded".into()))
    }

    fn enter_dom_ready(&mut self, resource: Resource) {
        let document = Document::parse(&resource.url, &resource.body);
        debug!(
            "parsed {} ({} bytes, {} elements)",
            resource.url,
            resource.body.len(),
            document.elements.len()
        );

        if self.config.enable_javascript {
            match ScriptContext::for_document(&document, self.viewport, &self.config) {
                Ok(mut ctx) => {
                    for (i, source) in document.scripts.iter().enumerate() {
                        if let Err(e) = ctx.evaluate(source) {
                            warn!("inline script #{} of {} failed: {}", i, resource.url, e);
                        }
                    }
                    if let Err(e) = ctx.evaluate("document.readyState = 'interactive'") {
                        warn!("failed to update readyState: {}", e);
                    }
                    self.script = Some(ctx);
                }
                Err(e) => {
                    warn!("page script context unavailable: {}", e);
                    self.script_error = Some(match e {
                        Error::ScriptError(msg) => msg,
                        other => other.to_string(),
                    });
                }
            }
        }

        self.url = Some(resource.url);
        self.document = Some(document);
        self.state = LoadState::DomReady;
        self.fire_dom_ready();
    }

    fn enter_loaded(&mut self) {
        if let Some(ctx) = self.script.as_mut() {
            if let Err(e) = ctx.evaluate("document.readyState = 'complete'") {
                warn!("failed to update readyState: {}", e);
            }
        }
        self.state = LoadState::Loaded;
        self.fire_finish_loading();
        if let Some(signal) = self.signal.take() {
            signal.complete();
        }
    }

    fn fail(&mut self, reason: String) {
        warn!("load failed: {}", reason);
        self.state = LoadState::Failed(reason.clone());
        if let Some(signal) = self.signal.take() {
            signal.fail(reason);
        }
    }

    // Callbacks are taken out for the call so they can borrow the view; a
    // callback that installs a replacement keeps the replacement.
    fn fire_dom_ready(&mut self) {
        if let Some(mut cb) = self.on_dom_ready.take() {
            cb(self);
            if self.on_dom_ready.is_none() {
                self.on_dom_ready = Some(cb);
            }
        }
    }

    fn fire_finish_loading(&mut self) {
        if let Some(mut cb) = self.on_finish_loading.take() {
            cb(self);
            if self.on_finish_loading.is_none() {
                self.on_finish_loading = Some(cb);
            }
        }
    }
}
