//! Decimation worker for decimesh
//!
//! This crate runs mesh decimation on a dedicated worker thread and exposes
//! it through a correlated request/response channel:
//! - Wire protocol types with their JSON shape
//! - The worker runtime (decode, stats, weld, simplify, encode)
//! - The RPC channel matching replies to calls by correlation id
//! - The [`Decimator`] client for buffers and URLs

pub mod protocol;
pub mod runtime;
pub mod rpc;
pub mod client;
pub mod config;
pub mod error;

pub use protocol::*;
pub use runtime::{WorkerChannels, WorkerRuntime};
pub use rpc::RpcChannel;
pub use client::{DecimateParams, Decimator};
pub use config::WorkerConfig;
pub use error::{DecimateError, Result};
