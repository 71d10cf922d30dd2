//! Worker configuration

use decimesh_simplification::{EdgeCollapseSimplifier, WeldOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a decimation worker and the channel in front of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Vertex welding applied before simplification
    pub weld: WeldOptions,
    /// Edge collapse engine settings
    pub simplifier: EdgeCollapseSimplifier,
    /// Per-call deadline in milliseconds (None waits indefinitely)
    pub request_timeout_ms: Option<u64>,
    /// Name of the worker thread
    pub thread_name: String,
    /// Worker thread stack size in bytes
    pub stack_size: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            weld: WeldOptions::default(),
            simplifier: EdgeCollapseSimplifier::default(),
            request_timeout_ms: None,
            thread_name: "decimesh-worker".to_string(),
            stack_size: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the weld options
    pub fn with_weld(mut self, weld: WeldOptions) -> Self {
        self.weld = weld;
        self
    }

    /// Set the simplification engine settings
    pub fn with_simplifier(mut self, simplifier: EdgeCollapseSimplifier) -> Self {
        self.simplifier = simplifier;
        self
    }

    /// Reject calls that get no reply within `timeout`
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the worker thread name
    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the worker thread stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a JSON configuration; absent fields keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
