//! Coalescing preview controller for decimesh
//!
//! Slider changes are debounced and coalesced so that at most one preview
//! decimation runs at a time, and the latest control values always win.
//! [`state`] holds the policy as a pure state machine; [`controller`] drives
//! it on a tokio task against a [`decimesh_worker::Decimator`].

pub mod state;
pub mod controller;

pub use state::{
    transition, CoalescingState, Effect, Event, JobOutcome, PanelParams, Phase, Trigger,
};
pub use controller::{
    group_thousands, stats_text, ControllerConfig, MeshSource, PanelController, PanelEvent,
    PanelHandle, PanelInput, STATUS_DOWNLOADED, STATUS_PREVIEW_UPDATED, STATUS_SIMPLIFYING,
    STATUS_SIMPLIFYING_DOWNLOAD, STATUS_SIMPLIFYING_PREVIEW,
};
