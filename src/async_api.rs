use crate::driver::{CaptureDriver, CaptureReport};
use crate::signal::CancellationToken;
use crate::{CaptureConfig, Error, Result};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Run(oneshot::Sender<Result<CaptureReport>>),
    Capture(String, PathBuf, oneshot::Sender<Result<CaptureReport>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly capture handle backed by a dedicated worker thread.
///
/// The worker thread owns a synchronous `CaptureDriver` (whose views and
/// script contexts are not `Send`) and runs captures sent from async tasks
/// one at a time, in submission order.
#[derive(Clone)]
pub struct Capturer {
    cmd_tx: Sender<Command>,
    cancel: CancellationToken,
}

impl Capturer {
    /// Create a capturer (spawns a background thread that owns the driver).
    pub async fn new(config: CaptureConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<CancellationToken>>();

        thread::Builder::new()
            .name("rfcapture-driver".into())
            .spawn(move || {
                let mut driver = match CaptureDriver::new(config) {
                    Ok(d) => d,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(driver.cancellation_token()));

                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Run(resp) => {
                            let _ = resp.send(driver.run());
                        }
                        Command::Capture(url, output, resp) => {
                            let _ = resp.send(driver.capture(&url, &output));
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(Ok(()));
                            break;
                        }
                    }
                }
            })
            .map_err(|e| Error::InitializationError(format!("Failed to spawn driver thread: {}", e)))?;

        // Wait for the worker to report initialization success or failure
        let cancel = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx, cancel })
    }

    /// Capture the configured URL to the configured output path.
    pub async fn run(&self) -> Result<CaptureReport> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Run(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Run canceled: {}", e)))?
    }

    /// Capture `url` to `output`.
    pub async fn capture(&self, url: &str, output: impl Into<PathBuf>) -> Result<CaptureReport> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Capture(url.to_string(), output.into(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Capture canceled: {}", e)))?
    }

    /// Cancel the running capture and every later one.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Shutdown the background worker.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("capture worker has shut down".into()))
    }
}
