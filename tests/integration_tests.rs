//! End-to-end captures against a local HTTP server

use rfcapture::{
    BitmapFormat, CaptureConfig, CaptureDriver, CancellationToken, DomReadyOutcome, EngineConfig, Error,
    LoadState, Renderer, ValueKind, Viewport,
};
use std::fs;
use std::time::Duration;
use tiny_http::{Response, Server};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Capture Test Page</title></head>
<body>
<h1>Hello from Test Server</h1>
<p>This is a capture test.</p>
</body>
</html>"#;

/// Start a test server on an ephemeral port; each request is served on its own thread.
fn start_test_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            std::thread::spawn(move || {
                let html = "Content-Type: text/html; charset=utf-8"
                    .parse::<tiny_http::Header>()
                    .unwrap();
                let path = request.url().to_string();
                let response = match path.as_str() {
                    "/" => Response::from_string(PAGE).with_header(html),
                    "/ua" => {
                        let ua = request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("User-Agent"))
                            .map(|h| h.value.as_str().to_string())
                            .unwrap_or_default();
                        let token = request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("X-Capture-Token"))
                            .map(|h| h.value.as_str().to_string())
                            .unwrap_or_default();
                        Response::from_string(format!(
                            "<html><body><p id=\"ua\">{}</p><p id=\"token\">{}</p></body></html>",
                            ua, token
                        ))
                        .with_header(html)
                    }
                    "/hang" => {
                        std::thread::sleep(Duration::from_secs(5));
                        Response::from_string(PAGE).with_header(html)
                    }
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            });
        }
    });
    format!("http://{}", addr)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(width: u32, height: u32) -> CaptureConfig {
    CaptureConfig {
        viewport: Viewport { width, height },
        load_timeout_ms: 10_000,
        ..Default::default()
    }
}

#[test]
fn test_capture_instruments_page_and_writes_png() {
    init_logging();
    let base_url = start_test_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output.png");

    let mut driver = CaptureDriver::new(config(320, 200)).unwrap();
    let report = driver.capture(&format!("{}/", base_url), &out).expect("capture");

    assert_eq!(report.load_finished_events, 1);
    match report.dom_ready {
        Some(DomReadyOutcome::Instrumented { dom_content_len, callbacks }) => {
            assert!(dom_content_len > 0);
            assert_eq!(callbacks, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(report.format, BitmapFormat::Rgba8);

    let decoder = png::Decoder::new(fs::File::open(&out).unwrap());
    let reader = decoder.read_info().unwrap();
    let info = reader.info();
    assert_eq!((info.width, info.height), (320, 200));
    assert_eq!(info.color_type, png::ColorType::Rgba);
    assert_eq!(info.bit_depth, png::BitDepth::Eight);
}

#[test]
fn test_signal_completes_once_and_callback_is_reachable() {
    init_logging();
    let base_url = start_test_server();
    let renderer = Renderer::new(EngineConfig::default()).unwrap();
    let mut view = renderer.create_view(200, 100, false).unwrap();

    let instrumentation = rfcapture::Instrumentation::from_config(&CaptureConfig::default());
    view.set_dom_ready_callback(move |view| {
        instrumentation.install(view).expect("install");
    });

    let signal = view.load_url(&format!("{}/", base_url));
    view.wait_for(&signal, Duration::from_secs(10), &CancellationToken::new())
        .expect("load");

    assert_eq!(view.state(), &LoadState::Loaded);
    assert_eq!(signal.completions(), 1);
    for _ in 0..5 {
        view.update();
    }
    assert_eq!(signal.completions(), 1);

    let rendered = view.evaluate_script("xxx.callbacks[0].render()").unwrap();
    assert_eq!(rendered.as_number(), Some(1123.0));
    let title = view.evaluate_script("document.title").unwrap();
    assert_eq!(title.as_str(), Some("Capture Test Page"));
}

#[test]
fn test_non_string_query_registers_nothing() {
    init_logging();
    let base_url = start_test_server();
    let dir = tempfile::tempdir().unwrap();
    let cfg = CaptureConfig {
        dom_query: "document.querySelectorAll('p').length".into(),
        ..config(64, 64)
    };
    let mut driver = CaptureDriver::new(cfg).unwrap();
    let report = driver
        .capture(&format!("{}/", base_url), dir.path().join("skip.png"))
        .expect("capture");
    assert_eq!(
        report.dom_ready,
        Some(DomReadyOutcome::Skipped { kind: ValueKind::Number })
    );
    assert!(dir.path().join("skip.png").exists());
}

#[test]
fn test_rerun_overwrites_with_identical_bytes() {
    init_logging();
    let base_url = start_test_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("same.png");
    fs::write(&out, b"stale").unwrap();

    let mut driver = CaptureDriver::new(config(160, 120)).unwrap();
    let first = driver.capture(&format!("{}/", base_url), &out).unwrap();
    let first_bytes = fs::read(&out).unwrap();
    let second = driver.capture(&format!("{}/", base_url), &out).unwrap();
    let second_bytes = fs::read(&out).unwrap();

    assert_ne!(first_bytes, b"stale".to_vec());
    assert_eq!(first.sha256, second.sha256);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_request_headers_are_sent() {
    init_logging();
    let base_url = start_test_server();
    let mut engine = EngineConfig {
        user_agent: "rfcapture-test/1.0".into(),
        ..Default::default()
    };
    engine.headers.insert("X-Capture-Token".into(), "abc123".into());

    let renderer = Renderer::new(engine).unwrap();
    let mut view = renderer.create_view(64, 64, false).unwrap();
    let signal = view.load_url(&format!("{}/ua", base_url));
    view.wait_for(&signal, Duration::from_secs(10), &CancellationToken::new())
        .unwrap();

    let ua = view.evaluate_script("document.getElementById('ua').textContent").unwrap();
    assert_eq!(ua.as_str(), Some("rfcapture-test/1.0"));
    let token = view.evaluate_script("document.getElementById('token').textContent").unwrap();
    assert_eq!(token.as_str(), Some("abc123"));
}

#[test]
fn test_http_error_is_a_load_error() {
    init_logging();
    let base_url = start_test_server();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("missing.png");
    let mut driver = CaptureDriver::new(config(64, 64)).unwrap();
    let err = driver.capture(&format!("{}/missing", base_url), &out).unwrap_err();
    assert!(matches!(err, Error::LoadError(_)), "got {:?}", err);
    assert!(!out.exists());
}

#[test]
fn test_hanging_load_times_out() {
    init_logging();
    let base_url = start_test_server();
    let dir = tempfile::tempdir().unwrap();
    let cfg = CaptureConfig {
        load_timeout_ms: 200,
        ..config(64, 64)
    };
    let mut driver = CaptureDriver::new(cfg).unwrap();
    let err = driver
        .capture(&format!("{}/hang", base_url), dir.path().join("t.png"))
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(200)), "got {:?}", err);
}

#[test]
fn test_cancelled_wait_stops_early() {
    init_logging();
    let base_url = start_test_server();
    let dir = tempfile::tempdir().unwrap();
    let mut driver = CaptureDriver::new(config(64, 64)).unwrap();

    let token = driver.cancellation_token();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        token.cancel();
    });

    let err = driver
        .capture(&format!("{}/hang", base_url), dir.path().join("c.png"))
        .unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, Error::Cancelled), "got {:?}", err);
}
