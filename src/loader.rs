//! Resource loading for views.
//!
//! Loads run on a background thread and report back over a channel; the view
//! picks the result up on its next `update()`.

use crate::{EngineConfig, Error, Result};
use base64::Engine as Base64Engine;
use log::debug;
use reqwest::blocking::Client;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

/// A fetched document
#[derive(Debug, Clone)]
pub struct Resource {
    /// Final URL after redirects
    pub url: String,
    /// Response body decoded as text
    pub body: String,
}

/// Build the HTTP client shared by every view of a renderer.
pub fn build_client(config: &EngineConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()
        .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))
}

/// Start loading `url` on a background thread.
pub fn spawn_load(client: Client, config: EngineConfig, url: String) -> Receiver<Result<Resource>> {
    let (tx, rx) = mpsc::channel();
    let worker_tx = tx.clone();
    let spawned = thread::Builder::new()
        .name("rfcapture-loader".into())
        .spawn(move || {
            let res = fetch(&client, &config, &url);
            let _ = worker_tx.send(res);
        });
    if let Err(e) = spawned {
        let _ = tx.send(Err(Error::LoadError(format!("Failed to spawn loader thread: {}", e))));
    }
    rx
}

/// Fetch a resource synchronously.
///
/// Supports `http(s)`, `file`, `data` and `about:blank`.
pub fn fetch(client: &Client, config: &EngineConfig, url: &str) -> Result<Resource> {
    let parsed = url::Url::parse(url).map_err(|e| Error::LoadError(format!("Invalid URL {}: {}", url, e)))?;
    debug!("fetching {} ({})", url, parsed.scheme());

    match parsed.scheme() {
        "http" | "https" => fetch_http(client, config, url),
        "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|_| Error::LoadError(format!("Not a local file URL: {}", url)))?;
            let bytes = std::fs::read(&path)
                .map_err(|e| Error::LoadError(format!("Failed to read {}: {}", path.display(), e)))?;
            Ok(Resource {
                url: url.to_string(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        }
        "data" => decode_data_url(url),
        "about" if parsed.path() == "blank" => Ok(Resource {
            url: url.to_string(),
            body: String::new(),
        }),
        other => Err(Error::LoadError(format!("Unsupported URL scheme: {}", other))),
    }
}

fn fetch_http(client: &Client, config: &EngineConfig, url: &str) -> Result<Resource> {
    let mut req = client.get(url).header("User-Agent", config.user_agent.clone());
    for (name, value) in &config.headers {
        req = req.header(name.as_str(), value.as_str());
    }

    let resp = req
        .send()
        .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::LoadError(format!("HTTP {} for {}", status, url)));
    }

    let final_url = resp.url().to_string();

    let body = resp
        .text()
        .map_err(|e| Error::LoadError(format!("Failed to read response body: {}", e)))?;

    Ok(Resource {
        url: final_url,
        body,
    })
}

fn decode_data_url(url: &str) -> Result<Resource> {
    let rest = url.strip_prefix("data:").unwrap_or(url);
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::LoadError("Malformed data URL (missing ',')".into()))?;

    // The media type is ignored; every body is treated as HTML.
    let bytes = if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::LoadError(format!("Invalid base64 in data URL: {}", e)))?
    } else {
        percent_decode(payload)
    };

    Ok(Resource {
        url: url.to_string(),
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}
