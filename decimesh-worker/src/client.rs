//! High-level decimation client
//!
//! [`Decimator`] validates parameters, fetches source bytes when given a URL
//! and forwards jobs over the [`RpcChannel`].

use crate::config::WorkerConfig;
use crate::error::{DecimateError, Result};
use crate::protocol::{DecimatePayload, DecimationResult, RequestKind};
use crate::rpc::RpcChannel;
use crate::runtime::WorkerRuntime;
use decimesh_io::ByteFetcher;
use serde::{Deserialize, Serialize};

/// Target ratio and error bound of a decimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimateParams {
    /// Fraction of triangles to keep, in (0, 1]
    pub ratio: f32,
    /// Maximum deviation relative to the mesh extent, at least 0
    pub error: f32,
}

impl Default for DecimateParams {
    fn default() -> Self {
        Self {
            ratio: 0.5,
            error: 0.001,
        }
    }
}

impl DecimateParams {
    pub fn new(ratio: f32, error: f32) -> Self {
        Self { ratio, error }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.ratio > 0.0 && self.ratio <= 1.0) {
            return Err(DecimateError::InvalidParams(format!(
                "ratio must be in (0, 1], got {}",
                self.ratio
            )));
        }
        if !(self.error >= 0.0 && self.error.is_finite()) {
            return Err(DecimateError::InvalidParams(format!(
                "error must be a finite value >= 0, got {}",
                self.error
            )));
        }
        Ok(())
    }
}

pub struct Decimator {
    channel: RpcChannel,
}

impl Decimator {
    /// Start a worker thread with the default runtime for `config`.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(config: WorkerConfig) -> std::io::Result<Self> {
        let runtime = WorkerRuntime::new(&config);
        Self::spawn_runtime(runtime, &config)
    }

    /// Start a worker thread running `runtime`
    pub fn spawn_runtime(runtime: WorkerRuntime, config: &WorkerConfig) -> std::io::Result<Self> {
        let worker = runtime.spawn(config)?;
        log::debug!("spawned decimation worker '{}'", config.thread_name);
        Ok(Self::from_channel(RpcChannel::connect(
            worker.requests,
            worker.responses,
            config.request_timeout(),
        )))
    }

    /// Use an existing channel
    pub fn from_channel(channel: RpcChannel) -> Self {
        Self { channel }
    }

    /// Decimate a binary glTF buffer; the buffer moves to the worker
    pub async fn decimate_buffer(
        &self,
        buffer: Vec<u8>,
        params: DecimateParams,
    ) -> Result<DecimationResult> {
        params.validate()?;
        let DecimateParams { ratio, error } = params;
        self.channel
            .call(RequestKind::Decimate(DecimatePayload { buffer, ratio, error }))
            .await
    }

    /// Fetch the bytes behind `url`, then decimate them.
    ///
    /// Nothing reaches the worker when the parameters are invalid or the fetch
    /// fails.
    pub async fn decimate_url<F: ByteFetcher>(
        &self,
        fetcher: &F,
        url: &str,
        params: DecimateParams,
    ) -> Result<DecimationResult> {
        params.validate()?;
        let buffer = fetcher.fetch(url).await.map_err(DecimateError::Fetch)?;
        log::debug!("fetched {} bytes from {}", buffer.len(), url);
        self.decimate_buffer(buffer, params).await
    }

    pub fn channel(&self) -> &RpcChannel {
        &self.channel
    }
}
