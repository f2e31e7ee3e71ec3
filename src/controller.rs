use crate::clock::{Clock, SystemClock};
use crate::export::{export_with_clock, ExportOptions, ExportSummary};
use crate::{DocumentPage, Error, Result};
use log::error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::{oneshot, watch};

enum Command {
    Export(ExportOptions, oneshot::Sender<Result<ExportSummary>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Observable state of the export trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to start an export
    Idle,
    /// An export is in progress; new starts are refused
    Running,
    /// The last export failed with this message; a new start is allowed
    Failed(String),
}

/// Async start/observe facade over a page owned by a dedicated worker thread.
///
/// The worker thread owns the `DocumentPage` (the CDP tab is not `Send`-friendly
/// across await points) and runs one export at a time. `start` is refused with
/// [`Error::Busy`] while an export is running.
pub struct ExportController {
    cmd_tx: Sender<Command>,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
}

/// An export that has been started; await [`PendingExport::wait`] for its result
pub struct PendingExport {
    rx: oneshot::Receiver<Result<ExportSummary>>,
}

impl PendingExport {
    pub async fn wait(self) -> Result<ExportSummary> {
        self.rx
            .await
            .map_err(|e| Error::Other(format!("Export canceled: {}", e)))?
    }
}

impl ExportController {
    /// Spawn the worker, open the page on it with `open`, and wait for that to succeed.
    pub async fn new<F, P>(open: F) -> Result<Self>
    where
        F: FnOnce() -> Result<P> + Send + 'static,
        P: DocumentPage + 'static,
    {
        Self::with_clock(open, SystemClock::new()).await
    }

    /// Like [`ExportController::new`] with an explicit clock for the capture waits
    pub async fn with_clock<F, P, C>(open: F, clock: C) -> Result<Self>
    where
        F: FnOnce() -> Result<P> + Send + 'static,
        P: DocumentPage + 'static,
        C: Clock + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let state_tx = Arc::new(state_tx);
        let worker_state = state_tx.clone();

        thread::spawn(move || {
            let mut page = match open() {
                Ok(p) => p,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Export(opts, resp) => {
                        // A panicking page must not leave the state stuck at Running
                        let res = panic::catch_unwind(AssertUnwindSafe(|| {
                            export_with_clock(&mut page, &clock, &opts)
                        }))
                        .unwrap_or_else(|payload| Err(Error::Other(panic_message(payload.as_ref()))));
                        match &res {
                            Ok(_) => {
                                worker_state.send_replace(SessionState::Idle);
                            }
                            Err(e) => {
                                error!("export failed: {}", e);
                                worker_state.send_replace(SessionState::Failed(e.to_string()));
                            }
                        }
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        drop(page);
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self {
            cmd_tx,
            state_tx,
            state_rx,
        })
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Start an export unless one is already running
    pub fn start(&self, opts: ExportOptions) -> Result<PendingExport> {
        let claimed = self.state_tx.send_if_modified(|s| {
            if *s == SessionState::Running {
                false
            } else {
                *s = SessionState::Running;
                true
            }
        });
        if !claimed {
            return Err(Error::Busy);
        }

        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Export(opts, tx)).is_err() {
            let msg = "export worker has stopped".to_string();
            self.state_tx.send_replace(SessionState::Failed(msg.clone()));
            return Err(Error::Other(msg));
        }
        Ok(PendingExport { rx })
    }

    /// Start an export and wait for it
    pub async fn run(&self, opts: ExportOptions) -> Result<ExportSummary> {
        self.start(opts)?.wait().await
    }

    /// Stop the worker and release the page
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("export panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{ScriptedPage, SectionScript};
    use crate::{OutlineCandidate, OutlineEntry, ScrollMetrics, SurfaceId};

    /// Blocks outline discovery until the test releases it
    struct GatedPage {
        inner: ScriptedPage,
        gate: mpsc::Receiver<()>,
    }

    impl DocumentPage for GatedPage {
        fn outline_candidates(&mut self) -> Result<Vec<OutlineCandidate>> {
            let _ = self.gate.recv();
            self.inner.outline_candidates()
        }
        fn click_outline(&mut self, entry: &OutlineEntry) -> Result<()> {
            self.inner.click_outline(entry)
        }
        fn scroll_metrics(&mut self) -> Result<ScrollMetrics> {
            self.inner.scroll_metrics()
        }
        fn scroll_to(&mut self, offset: f64) -> Result<()> {
            self.inner.scroll_to(offset)
        }
        fn visible_surfaces(&mut self) -> Result<Vec<SurfaceId>> {
            self.inner.visible_surfaces()
        }
        fn surface_pixels(&mut self, id: SurfaceId) -> Result<image::RgbaImage> {
            self.inner.surface_pixels(id)
        }
        fn title(&mut self) -> Result<Option<String>> {
            self.inner.title()
        }
    }

    fn options(dir: &std::path::Path) -> ExportOptions {
        ExportOptions {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn second_start_is_refused_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let (release, gate) = mpsc::channel();
        let page = GatedPage {
            inner: ScriptedPage::new()
                .candidate(0, "Only")
                .section(0, SectionScript::new(1000.0, 1e9).reveal(0.0, 1))
                .titled("Gated"),
            gate,
        };
        let ctl = ExportController::with_clock(move || Ok(page), ManualClock::new())
            .await
            .unwrap();
        assert_eq!(ctl.state(), SessionState::Idle);

        let pending = ctl.start(options(dir.path())).unwrap();
        assert_eq!(ctl.state(), SessionState::Running);
        assert!(matches!(ctl.start(options(dir.path())), Err(Error::Busy)));

        release.send(()).unwrap();
        let summary = pending.wait().await.unwrap();
        assert_eq!(summary.pages, 1);
        assert_eq!(ctl.state(), SessionState::Idle);

        ctl.close().await.unwrap();
    }

    #[tokio::test]
    async fn failure_moves_to_failed_and_allows_restart() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = ExportController::with_clock(|| Ok(ScriptedPage::new()), ManualClock::new())
            .await
            .unwrap();
        let mut states = ctl.subscribe();

        let err = ctl.run(options(dir.path())).await.unwrap_err();
        assert!(matches!(err, Error::NoOutline));
        match ctl.state() {
            SessionState::Failed(msg) => assert!(msg.contains("No outline")),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(states.has_changed().unwrap());
        let _ = states.borrow_and_update();

        // Failed is not a lock: a retry is accepted
        assert!(ctl.run(options(dir.path())).await.is_err());
        ctl.close().await.unwrap();
    }

    /// Panics on the first outline query, then behaves
    struct FlakyPage {
        inner: ScriptedPage,
        panicked: bool,
    }

    impl DocumentPage for FlakyPage {
        fn outline_candidates(&mut self) -> Result<Vec<OutlineCandidate>> {
            if !self.panicked {
                self.panicked = true;
                panic!("renderer crashed");
            }
            self.inner.outline_candidates()
        }
        fn click_outline(&mut self, entry: &OutlineEntry) -> Result<()> {
            self.inner.click_outline(entry)
        }
        fn scroll_metrics(&mut self) -> Result<ScrollMetrics> {
            self.inner.scroll_metrics()
        }
        fn scroll_to(&mut self, offset: f64) -> Result<()> {
            self.inner.scroll_to(offset)
        }
        fn visible_surfaces(&mut self) -> Result<Vec<SurfaceId>> {
            self.inner.visible_surfaces()
        }
        fn surface_pixels(&mut self, id: SurfaceId) -> Result<image::RgbaImage> {
            self.inner.surface_pixels(id)
        }
        fn title(&mut self) -> Result<Option<String>> {
            self.inner.title()
        }
    }

    #[tokio::test]
    async fn panicking_page_fails_the_export_and_frees_the_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let page = FlakyPage {
            inner: ScriptedPage::new()
                .candidate(0, "Only")
                .section(0, SectionScript::new(1000.0, 1e9).reveal(0.0, 1))
                .titled("Flaky"),
            panicked: false,
        };
        let ctl = ExportController::with_clock(move || Ok(page), ManualClock::new())
            .await
            .unwrap();

        let err = ctl.run(options(dir.path())).await.unwrap_err();
        assert!(err.to_string().contains("renderer crashed"), "{}", err);
        assert!(matches!(ctl.state(), SessionState::Failed(_)));

        let summary = ctl.run(options(dir.path())).await.unwrap();
        assert_eq!(summary.pages, 1);
        assert_eq!(ctl.state(), SessionState::Idle);

        ctl.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_failure_is_reported_by_new() {
        let res = ExportController::new(|| -> Result<ScriptedPage> {
            Err(Error::InitializationError("no chrome".into()))
        })
        .await;
        assert!(matches!(res, Err(Error::InitializationError(_))));
    }
}
