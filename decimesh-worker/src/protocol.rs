//! Messages exchanged between the RPC channel and the worker
//!
//! Requests are tagged `{ "id", "type", "payload" }` and replies
//! `{ "id", "ok", "result" | "error" }`. The Rust types carry the same
//! information; the serde representation exists for logs and dumps.

use decimesh_core::MeshStats;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier pairing a reply with the request that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source buffer and parameters of one decimation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecimatePayload {
    pub buffer: Vec<u8>,
    pub ratio: f32,
    pub error: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum RequestKind {
    Decimate(DecimatePayload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRequest {
    pub id: CorrelationId,
    pub kind: RequestKind,
}

impl WorkerRequest {
    pub fn decimate(id: CorrelationId, buffer: Vec<u8>, ratio: f32, error: f32) -> Self {
        Self {
            id,
            kind: RequestKind::Decimate(DecimatePayload { buffer, ratio, error }),
        }
    }
}

impl Serialize for WorkerRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", &self.id)?;
        match &self.kind {
            RequestKind::Decimate(payload) => {
                map.serialize_entry("type", "decimate")?;
                map.serialize_entry("payload", payload)?;
            }
        }
        map.end()
    }
}

/// Output of a successful job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecimationResult {
    #[serde(rename = "glb")]
    pub output_buffer: Vec<u8>,
    pub before: MeshStats,
    pub after: MeshStats,
}

/// What the worker sends back: the result, or the failure's display string
pub type WorkerReply = Result<DecimationResult, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResponse {
    pub id: CorrelationId,
    pub reply: WorkerReply,
}

impl WorkerResponse {
    pub fn ok(id: CorrelationId, result: DecimationResult) -> Self {
        Self { id, reply: Ok(result) }
    }

    pub fn err<S: Into<String>>(id: CorrelationId, message: S) -> Self {
        Self {
            id,
            reply: Err(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.reply.is_ok()
    }
}

impl Serialize for WorkerResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", &self.id)?;
        match &self.reply {
            Ok(result) => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("result", result)?;
            }
            Err(message) => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", message)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = WorkerRequest::decimate(CorrelationId::new(7), vec![1, 2], 0.5, 0.25);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "type": "decimate",
                "payload": { "buffer": [1, 2], "ratio": 0.5, "error": 0.25 }
            })
        );
    }

    #[test]
    fn test_success_shape() {
        let response = WorkerResponse::ok(
            CorrelationId::new(3),
            DecimationResult {
                output_buffer: vec![9],
                before: MeshStats::new(300, 200),
                after: MeshStats::new(90, 61),
            },
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "ok": true,
                "result": {
                    "glb": [9],
                    "before": { "triangles": 300, "vertices": 200 },
                    "after": { "triangles": 90, "vertices": 61 }
                }
            })
        );
    }

    #[test]
    fn test_failure_shape() {
        let response = WorkerResponse::err(CorrelationId::new(4), "Decode error: bad magic");
        assert!(!response.is_ok());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({ "id": 4, "ok": false, "error": "Decode error: bad magic" }));
    }

    #[test]
    fn test_request_kind_tagging() {
        let kind: RequestKind = serde_json::from_value(json!({
            "type": "decimate",
            "payload": { "buffer": [], "ratio": 1.0, "error": 0.0 }
        }))
        .unwrap();
        assert_eq!(
            kind,
            RequestKind::Decimate(DecimatePayload { buffer: vec![], ratio: 1.0, error: 0.0 })
        );
    }

    #[test]
    fn test_correlation_id_display() {
        assert_eq!(CorrelationId::new(12).to_string(), "#12");
        assert_eq!(CorrelationId::new(12).get(), 12);
    }
}
