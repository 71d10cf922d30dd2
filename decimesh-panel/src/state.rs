//! Coalescing state machine
//!
//! The controller's policy as a pure function from `(state, event)` to the
//! next state and the effects to perform. Slider changes are debounced, at
//! most one preview is in flight, and changes that arrive during a flight
//! collapse into a single follow-up preview that uses the latest values.

use decimesh_worker::{DecimateParams, DecimationResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Values of the panel controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelParams {
    pub ratio: f32,
    pub error: f32,
    pub wireframe: bool,
}

impl Default for PanelParams {
    fn default() -> Self {
        Self {
            ratio: 0.3,
            error: 0.05,
            wireframe: true,
        }
    }
}

impl PanelParams {
    pub fn decimate_params(&self) -> DecimateParams {
        DecimateParams::new(self.ratio, self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing scheduled or running
    Idle,
    /// Debounce timer armed
    Scheduled,
    /// One preview running
    InFlight,
    /// One preview running and another owed when it finishes
    InFlightQueued,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoalescingState {
    pub phase: Phase,
    /// Latest control values
    pub pending: PanelParams,
}

impl CoalescingState {
    pub fn new(params: PanelParams) -> Self {
        Self {
            phase: Phase::Idle,
            pending: params,
        }
    }
}

impl Default for CoalescingState {
    fn default() -> Self {
        Self::new(PanelParams::default())
    }
}

/// How a preview or download job ended
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Succeeded(Arc<DecimationResult>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum Event {
    ParamsChanged(PanelParams),
    TimerFired,
    PreviewRequested,
    PreviewFinished(JobOutcome),
    DownloadRequested,
    DownloadFinished(JobOutcome),
    WireframeToggled(bool),
}

/// What started a preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Debounced slider change, or the follow-up owed after a flight
    Auto,
    /// The preview button
    Button,
}

#[derive(Debug, Clone)]
pub enum Effect {
    /// Start (or restart) the debounce timer
    ArmTimer,
    CancelTimer,
    DispatchPreview(PanelParams, Trigger),
    DispatchDownload(PanelParams),
    ReportPreview(JobOutcome),
    ReportDownload(JobOutcome),
    NotifyWireframe(bool),
}

/// Advance the state machine by one event
pub fn transition(state: CoalescingState, event: Event) -> (CoalescingState, Vec<Effect>) {
    use Phase::*;

    let CoalescingState { phase, mut pending } = state;
    let (phase, effects) = match (phase, event) {
        (Idle | Scheduled, Event::ParamsChanged(params)) => {
            pending = params;
            (Scheduled, vec![Effect::ArmTimer])
        }
        (InFlight | InFlightQueued, Event::ParamsChanged(params)) => {
            pending = params;
            (InFlightQueued, vec![])
        }

        (Scheduled, Event::TimerFired) => (
            InFlight,
            vec![Effect::DispatchPreview(pending, Trigger::Auto)],
        ),
        (phase, Event::TimerFired) => (phase, vec![]),

        (Idle | Scheduled, Event::PreviewRequested) => (
            InFlight,
            vec![Effect::CancelTimer, Effect::DispatchPreview(pending, Trigger::Button)],
        ),
        (InFlight | InFlightQueued, Event::PreviewRequested) => (InFlightQueued, vec![]),

        (InFlight, Event::PreviewFinished(outcome)) => (Idle, vec![Effect::ReportPreview(outcome)]),
        (InFlightQueued, Event::PreviewFinished(outcome)) => (
            InFlight,
            vec![
                Effect::ReportPreview(outcome),
                Effect::DispatchPreview(pending, Trigger::Auto),
            ],
        ),
        // Not produced by the controller: previews only finish while in flight
        (phase, Event::PreviewFinished(outcome)) => (phase, vec![Effect::ReportPreview(outcome)]),

        (phase, Event::DownloadRequested) => (phase, vec![Effect::DispatchDownload(pending)]),
        (phase, Event::DownloadFinished(outcome)) => (phase, vec![Effect::ReportDownload(outcome)]),

        (phase, Event::WireframeToggled(wireframe)) => {
            pending.wireframe = wireframe;
            (phase, vec![Effect::NotifyWireframe(wireframe)])
        }
    };

    (CoalescingState { phase, pending }, effects)
}
