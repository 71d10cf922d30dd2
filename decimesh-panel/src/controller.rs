//! Async driver for the coalescing state machine
//!
//! The controller is a single tokio task. It turns panel inputs into state
//! machine events, performs the resulting effects (timer, worker jobs, sink
//! events) and feeds job completions back into the machine.

use crate::state::{transition, CoalescingState, Effect, Event, JobOutcome, PanelParams, Trigger};
use decimesh_core::MeshStats;
use decimesh_io::{save_glb, ByteFetcher, DEFAULT_FILENAME};
use decimesh_worker::{DecimateError, DecimationResult, Decimator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Sleep;

pub const STATUS_SIMPLIFYING: &str = "Simplifying…";
pub const STATUS_SIMPLIFYING_PREVIEW: &str = "Simplifying (preview)…";
pub const STATUS_SIMPLIFYING_DOWNLOAD: &str = "Simplifying (download)…";
pub const STATUS_PREVIEW_UPDATED: &str = "Preview updated.";
pub const STATUS_DOWNLOADED: &str = "Downloaded simplified GLB.";

/// Configuration for a panel controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Quiet period after the last slider change before a preview starts
    pub debounce_ms: u64,
    /// Where downloads are written
    pub download_path: PathBuf,
    /// Initial control values
    pub defaults: PanelParams,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 350,
            download_path: PathBuf::from(DEFAULT_FILENAME),
            defaults: PanelParams::default(),
        }
    }
}

impl ControllerConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self
    }

    pub fn with_download_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.download_path = path.into();
        self
    }

    pub fn with_defaults(mut self, defaults: PanelParams) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// The mesh the panel decimates
#[derive(Debug, Clone)]
pub enum MeshSource {
    /// Binary glTF already in memory
    Bytes(Arc<Vec<u8>>),
    /// Location resolved by the controller's fetcher
    Url(String),
}

/// User interactions with the panel
#[derive(Debug, Clone)]
pub enum PanelInput {
    Ratio(f32),
    Error(f32),
    Wireframe(bool),
    Preview,
    Download,
    SetSource(MeshSource),
}

/// What the controller reports to the surrounding application
#[derive(Debug, Clone)]
pub enum PanelEvent {
    Status(String),
    Stats(String),
    Preview {
        result: Arc<DecimationResult>,
        wireframe: bool,
    },
    Wireframe(bool),
}

/// `1234567` as `"1,234,567"`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `before: N tris • after: M tris`
pub fn stats_text(before: &MeshStats, after: &MeshStats) -> String {
    format!(
        "before: {} tris • after: {} tris",
        group_thousands(before.triangles),
        group_thousands(after.triangles)
    )
}

#[derive(Debug, Clone, Copy)]
enum JobKind {
    Preview,
    Download,
}

enum Wake {
    Input(Option<PanelInput>),
    Finished(Event),
    Timer,
}

async fn timer_elapsed(timer: Option<&mut Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

pub struct PanelController<F> {
    decimator: Arc<Decimator>,
    fetcher: Arc<F>,
    config: ControllerConfig,
    state: CoalescingState,
    source: Option<MeshSource>,
    events: mpsc::UnboundedSender<PanelEvent>,
    timer: Option<Pin<Box<Sleep>>>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions_rx: mpsc::UnboundedReceiver<Event>,
}

impl<F: ByteFetcher + 'static> PanelController<F> {
    pub fn new(
        decimator: Arc<Decimator>,
        fetcher: Arc<F>,
        config: ControllerConfig,
        events: mpsc::UnboundedSender<PanelEvent>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            decimator,
            fetcher,
            state: CoalescingState::new(config.defaults),
            config,
            source: None,
            events,
            timer: None,
            completions_tx,
            completions_rx,
        }
    }

    /// Run on its own task; the returned handle feeds it inputs
    pub fn spawn(self) -> PanelHandle {
        let (inputs, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(receiver));
        PanelHandle { inputs, task }
    }

    /// Process inputs until every input sender is dropped
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<PanelInput>) {
        loop {
            let wake = tokio::select! {
                input = inputs.recv() => Wake::Input(input),
                Some(event) = self.completions_rx.recv() => Wake::Finished(event),
                _ = timer_elapsed(self.timer.as_mut()) => Wake::Timer,
            };

            match wake {
                Wake::Input(Some(input)) => self.on_input(input),
                Wake::Input(None) => break,
                Wake::Finished(event) => self.apply(event),
                Wake::Timer => {
                    self.timer = None;
                    self.apply(Event::TimerFired);
                }
            }
        }
        log::debug!("panel controller stopped");
    }

    fn on_input(&mut self, input: PanelInput) {
        let current = self.state.pending;
        let event = match input {
            PanelInput::Ratio(ratio) => Event::ParamsChanged(PanelParams { ratio, ..current }),
            PanelInput::Error(error) => Event::ParamsChanged(PanelParams { error, ..current }),
            PanelInput::Wireframe(wireframe) => Event::WireframeToggled(wireframe),
            PanelInput::Preview => Event::PreviewRequested,
            PanelInput::Download => Event::DownloadRequested,
            PanelInput::SetSource(source) => {
                log::debug!("panel source set to {}", source_label(&source));
                self.source = Some(source);
                return;
            }
        };
        self.apply(event);
    }

    fn apply(&mut self, event: Event) {
        let (state, effects) = transition(self.state, event);
        if state.phase != self.state.phase {
            log::trace!("panel {:?} -> {:?}", self.state.phase, state.phase);
        }
        self.state = state;
        for effect in effects {
            self.perform(effect);
        }
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::ArmTimer => {
                self.timer = Some(Box::pin(tokio::time::sleep(self.config.debounce())));
            }
            Effect::CancelTimer => self.timer = None,
            Effect::DispatchPreview(params, Trigger::Auto) => {
                self.dispatch(JobKind::Preview, params, STATUS_SIMPLIFYING)
            }
            Effect::DispatchPreview(params, Trigger::Button) => {
                self.dispatch(JobKind::Preview, params, STATUS_SIMPLIFYING_PREVIEW)
            }
            Effect::DispatchDownload(params) => {
                self.dispatch(JobKind::Download, params, STATUS_SIMPLIFYING_DOWNLOAD)
            }
            Effect::ReportPreview(outcome) => match outcome {
                JobOutcome::Succeeded(result) => {
                    self.emit(PanelEvent::Stats(stats_text(&result.before, &result.after)));
                    self.emit(PanelEvent::Preview {
                        result,
                        wireframe: self.state.pending.wireframe,
                    });
                    self.emit(PanelEvent::Status(STATUS_PREVIEW_UPDATED.to_string()));
                }
                JobOutcome::Failed(message) => self.report_failure(&message),
            },
            Effect::ReportDownload(outcome) => match outcome {
                JobOutcome::Succeeded(result) => {
                    self.emit(PanelEvent::Stats(stats_text(&result.before, &result.after)));
                    self.emit(PanelEvent::Status(STATUS_DOWNLOADED.to_string()));
                }
                JobOutcome::Failed(message) => self.report_failure(&message),
            },
            Effect::NotifyWireframe(wireframe) => self.emit(PanelEvent::Wireframe(wireframe)),
        }
    }

    fn dispatch(&mut self, kind: JobKind, params: PanelParams, status: &str) {
        self.emit(PanelEvent::Status(status.to_string()));

        let decimator = self.decimator.clone();
        let fetcher = self.fetcher.clone();
        let source = self.source.clone();
        let download_path = self.config.download_path.clone();
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let job = run_job(kind, &decimator, fetcher.as_ref(), source, params, download_path);
            let outcome = match job.await {
                Ok(result) => JobOutcome::Succeeded(Arc::new(result)),
                Err(message) => JobOutcome::Failed(message),
            };
            let event = match kind {
                JobKind::Preview => Event::PreviewFinished(outcome),
                JobKind::Download => Event::DownloadFinished(outcome),
            };
            // The controller owns the receiver, so this only fails once it has stopped
            let _ = completions.send(event);
        });
    }

    fn report_failure(&self, message: &str) {
        log::warn!("decimation failed: {}", message);
        self.emit(PanelEvent::Status(format!("Failed: {}", message)));
    }

    fn emit(&self, event: PanelEvent) {
        if self.events.send(event).is_err() {
            log::trace!("panel event dropped, no listener");
        }
    }
}

fn source_label(source: &MeshSource) -> String {
    match source {
        MeshSource::Bytes(bytes) => format!("{} bytes", bytes.len()),
        MeshSource::Url(url) => url.clone(),
    }
}

async fn run_job<F: ByteFetcher>(
    kind: JobKind,
    decimator: &Decimator,
    fetcher: &F,
    source: Option<MeshSource>,
    params: PanelParams,
    download_path: PathBuf,
) -> Result<DecimationResult, String> {
    let params = params.decimate_params();
    let result = match source {
        None => return Err("no mesh source selected".to_string()),
        Some(MeshSource::Bytes(bytes)) => {
            decimator.decimate_buffer(bytes.as_ref().clone(), params).await
        }
        Some(MeshSource::Url(url)) => decimator.decimate_url(fetcher, &url, params).await,
    }
    .map_err(|e: DecimateError| e.to_string())?;

    if let JobKind::Download = kind {
        save_glb(&result.output_buffer, &download_path)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(result)
}

/// Input side of a spawned [`PanelController`]
pub struct PanelHandle {
    inputs: mpsc::UnboundedSender<PanelInput>,
    task: JoinHandle<()>,
}

impl PanelHandle {
    /// Queue an input; returns false once the controller has stopped
    pub fn send(&self, input: PanelInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn set_ratio(&self, ratio: f32) -> bool {
        self.send(PanelInput::Ratio(ratio))
    }

    pub fn set_error(&self, error: f32) -> bool {
        self.send(PanelInput::Error(error))
    }

    pub fn set_wireframe(&self, wireframe: bool) -> bool {
        self.send(PanelInput::Wireframe(wireframe))
    }

    pub fn preview(&self) -> bool {
        self.send(PanelInput::Preview)
    }

    pub fn download(&self) -> bool {
        self.send(PanelInput::Download)
    }

    pub fn set_source(&self, source: MeshSource) -> bool {
        self.send(PanelInput::SetSource(source))
    }

    /// Stop accepting inputs and wait for the controller to exit
    pub async fn close(self) {
        drop(self.inputs);
        if let Err(e) = self.task.await {
            log::warn!("panel controller task failed: {}", e);
        }
    }
}
