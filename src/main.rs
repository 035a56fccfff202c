use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use rfcapture::{CaptureConfig, CaptureDriver, EngineConfig, Viewport};
use std::collections::HashMap;
use std::path::PathBuf;

/// Load a page headlessly, instrument it on DOM-ready and save a PNG snapshot.
#[derive(Parser, Debug)]
#[command(name = "rfcapture", version, about)]
struct Args {
    /// URL to load (http, https, file, data or about:blank)
    #[arg(default_value = "https://google.com")]
    url: String,

    /// Path of the PNG to write; overwritten if it exists
    #[arg(short, long, default_value = "output.png")]
    output: PathBuf,

    /// View width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// View height in pixels
    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Give up if the page has not finished loading after this many milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,

    /// User agent sent with HTTP requests
    #[arg(long)]
    user_agent: Option<String>,

    /// Extra request header, `NAME:VALUE` (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Global identifier bound to the native callback
    #[arg(long, default_value = "xxxx")]
    global_name: String,

    /// Page-global object whose `callbacks` list receives the native callback
    #[arg(long, default_value = "xxx")]
    namespace: String,

    /// Script expression evaluated on DOM-ready
    #[arg(long, default_value = "document.body.innerHTML")]
    dom_query: String,

    /// Render with a transparent background
    #[arg(long)]
    transparent: bool,

    /// Disable page scripting (no instrumentation happens)
    #[arg(long)]
    no_javascript: bool,

    /// Print the capture report as JSON on stdout
    #[arg(long)]
    report: bool,
}

fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>> {
    let mut headers = HashMap::new();
    for h in raw {
        let Some((name, value)) = h.split_once(':') else {
            bail!("invalid header {:?}, expected NAME:VALUE", h);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("invalid header {:?}, empty name", h);
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

impl Args {
    fn into_config(self) -> Result<CaptureConfig> {
        let mut engine = EngineConfig {
            headers: parse_headers(&self.headers)?,
            enable_javascript: !self.no_javascript,
            ..Default::default()
        };
        if let Some(ua) = self.user_agent {
            engine.user_agent = ua;
        }
        Ok(CaptureConfig {
            url: self.url,
            output: self.output,
            viewport: Viewport {
                width: self.width,
                height: self.height,
            },
            transparent: self.transparent,
            load_timeout_ms: self.timeout_ms,
            global_name: self.global_name,
            namespace: self.namespace,
            dom_query: self.dom_query,
            engine,
            ..Default::default()
        })
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let print_report = args.report;
    let config = args.into_config()?;

    let mut driver = CaptureDriver::new(config).context("failed to set up capture")?;
    let report = driver.run().context("capture failed")?;

    if print_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
