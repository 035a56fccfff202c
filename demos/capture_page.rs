//! Capture a page served by a tiny local server and print the report.
//!
//! cargo run --example capture_page

use rfcapture::{CaptureConfig, CaptureDriver, Viewport};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Use a tiny HTTP server to provide deterministic content for the example
    let server = tiny_http::Server::http("127.0.0.1:0")?;
    let addr = server.server_addr();

    std::thread::spawn(move || {
        if let Ok(req) = server.recv() {
            let html = r##"<html><head><title>RF Capture</title></head><body bgcolor="#f0f4ff"><h1>Hello RF</h1><p>Captured without a browser.</p></body></html>"##;
            let _ = req.respond(tiny_http::Response::from_string(html));
        }
    });

    let config = CaptureConfig {
        url: format!("http://{}/", addr),
        output: "capture_page.png".into(),
        viewport: Viewport { width: 640, height: 360 },
        ..Default::default()
    };

    println!("Loading: {}", config.url);
    let mut driver = CaptureDriver::new(config)?;
    let report = driver.run()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
