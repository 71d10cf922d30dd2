//! Worker runtime
//!
//! The worker owns the codec and the simplification adapter and runs on its
//! own OS thread. Jobs are taken from a single FIFO queue and processed one at
//! a time; every job produces exactly one response carrying the job's id.

use crate::config::WorkerConfig;
use crate::protocol::{
    CorrelationId, DecimatePayload, DecimationResult, RequestKind, WorkerRequest, WorkerResponse,
};
use decimesh_core::{MeshStats, Result};
use decimesh_io::{GlbCodec, MeshCodec};
use decimesh_simplification::{weld_document, Ready, SimplifierAdapter, WeldOptions};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Channels and thread of a running worker
pub struct WorkerChannels {
    /// Job queue; dropping every sender stops the worker after its current job
    pub requests: flume::Sender<WorkerRequest>,
    pub responses: flume::Receiver<WorkerResponse>,
    pub thread: thread::JoinHandle<()>,
}

pub struct WorkerRuntime {
    codec: Box<dyn MeshCodec>,
    adapter: SimplifierAdapter,
    weld: WeldOptions,
}

impl WorkerRuntime {
    /// Create a runtime with the binary glTF codec and the configured engine
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            codec: Box::new(GlbCodec::new().with_generator("decimesh")),
            adapter: SimplifierAdapter::new(config.simplifier.clone()),
            weld: config.weld,
        }
    }

    /// Replace the codec
    pub fn with_codec<C: MeshCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replace the simplification adapter
    pub fn with_adapter(mut self, adapter: SimplifierAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    /// Prepare the engine unless an earlier job already did
    fn require_ready(&self) -> Result<Ready> {
        match self.adapter.try_ready() {
            Some(ready) => Ok(ready),
            None => futures::executor::block_on(self.adapter.ready()),
        }
    }

    fn decimate(&mut self, payload: DecimatePayload) -> Result<DecimationResult> {
        let DecimatePayload { buffer, ratio, error } = payload;

        let mut document = self.codec.decode(&buffer)?;
        drop(buffer);
        let before = MeshStats::of(&document);

        let ready = self.require_ready()?;
        weld_document(&mut document, &self.weld)?;
        self.adapter.simplify_document(ready, &mut document, ratio, error)?;

        let after = MeshStats::of(&document);
        let output_buffer = self.codec.encode(&document)?;

        Ok(DecimationResult {
            output_buffer,
            before,
            after,
        })
    }

    /// Run one request to completion, turning failures and panics into error replies
    pub fn handle(&mut self, request: WorkerRequest) -> WorkerResponse {
        let WorkerRequest { id, kind } = request;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match kind {
            RequestKind::Decimate(payload) => self.decimate(payload),
        }));

        match outcome {
            Ok(Ok(result)) => {
                log::debug!(
                    "job {}: {} -> {} triangles",
                    id,
                    result.before.triangles,
                    result.after.triangles
                );
                WorkerResponse::ok(id, result)
            }
            Ok(Err(e)) => {
                log::warn!("job {} failed: {}", id, e);
                WorkerResponse::err(id, e.to_string())
            }
            Err(payload) => {
                let message = format!(
                    "decimation job panicked: {}",
                    panic_message(payload.as_ref())
                );
                log::error!("job {}: {}", id, message);
                WorkerResponse::err(id, message)
            }
        }
    }

    /// Serve requests until the request queue closes or nobody listens for replies
    pub fn run(
        mut self,
        requests: flume::Receiver<WorkerRequest>,
        responses: flume::Sender<WorkerResponse>,
    ) {
        if let Err(e) = self.require_ready() {
            log::warn!("simplification engine not ready at startup: {}", e);
        }

        while let Ok(request) = requests.recv() {
            let id: CorrelationId = request.id;
            let response = self.handle(request);
            if responses.send(response).is_err() {
                log::debug!("reply for job {} has no receiver, stopping worker", id);
                break;
            }
        }
        log::debug!("worker stopped");
    }

    /// Start the worker on a dedicated thread
    pub fn spawn(self, config: &WorkerConfig) -> std::io::Result<WorkerChannels> {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let thread = builder.spawn(move || self.run(request_rx, response_tx))?;

        Ok(WorkerChannels {
            requests: request_tx,
            responses: response_rx,
            thread,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decimesh_core::{
        Error, Mesh, MeshDocument, Node, Primitive, Topology, Transform, TriangleMesh,
    };
    use decimesh_simplification::MeshSimplifier;

    fn quad_document() -> MeshDocument {
        MeshDocument::from_meshes(vec![Mesh::new(vec![Primitive::triangles(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            vec![0, 1, 2, 2, 1, 3],
        )])])
    }

    fn quad_glb() -> Vec<u8> {
        decimesh_io::write_glb(&quad_document()).unwrap()
    }

    fn request(id: u64, buffer: Vec<u8>) -> WorkerRequest {
        WorkerRequest::decimate(CorrelationId::new(id), buffer, 1.0, 0.0)
    }

    struct PanickingEngine;

    impl MeshSimplifier for PanickingEngine {
        fn simplify(
            &self,
            _mesh: &TriangleMesh,
            _ratio: f32,
            _max_error: f32,
        ) -> Result<TriangleMesh> {
            panic!("engine exploded")
        }
    }

    struct NeverReady;

    impl MeshSimplifier for NeverReady {
        fn prepare(&self) -> Result<()> {
            Err(Error::NotReady("engine unavailable".to_string()))
        }

        fn simplify(
            &self,
            mesh: &TriangleMesh,
            _ratio: f32,
            _max_error: f32,
        ) -> Result<TriangleMesh> {
            Ok(mesh.clone())
        }
    }

    #[test]
    fn test_handle_success() {
        let mut runtime = WorkerRuntime::new(&WorkerConfig::default());
        let response = runtime.handle(request(1, quad_glb()));
        assert_eq!(response.id, CorrelationId::new(1));

        let result = response.reply.unwrap();
        assert_eq!(result.before, MeshStats::new(2, 4));
        assert_eq!(result.after, MeshStats::new(2, 4));
        let decoded = decimesh_io::read_glb(&result.output_buffer).unwrap();
        assert_eq!(MeshStats::of(&decoded), result.after);
    }

    #[test]
    fn test_unindexed_input_keeps_counts_consistent() {
        let mut positions = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                let (x, y) = (x as f32, y as f32);
                positions.extend_from_slice(&[
                    [x, y, 0.0],
                    [x + 1.0, y, 0.0],
                    [x, y + 1.0, 0.0],
                    [x, y + 1.0, 0.0],
                    [x + 1.0, y, 0.0],
                    [x + 1.0, y + 1.0, 0.0],
                ]);
            }
        }
        let soup = Primitive::with_mode(Topology::Triangles, Some(positions), None);
        let doc = MeshDocument::from_meshes(vec![Mesh::new(vec![soup])]);
        let glb = decimesh_io::write_glb(&doc).unwrap();

        let mut runtime = WorkerRuntime::new(&WorkerConfig::default());
        let request = WorkerRequest::decimate(CorrelationId::new(7), glb, 0.5, 0.05);
        let result = runtime.handle(request).reply.unwrap();

        assert_eq!(result.before, MeshStats::new(0, 54));
        assert_eq!(result.after, result.before);
    }

    #[test]
    fn test_node_hierarchy_survives_decimation() {
        let mut doc = quad_document();
        let moved = Transform::Decomposed {
            translation: [5.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [2.0; 3],
        };
        doc.nodes.push(Node::with_mesh(0).with_transform(moved));
        doc.scenes[0].nodes.push(1);

        let mut runtime = WorkerRuntime::new(&WorkerConfig::default());
        let glb = decimesh_io::write_glb(&doc).unwrap();
        let request = WorkerRequest::decimate(CorrelationId::new(8), glb, 0.5, 0.05);
        let result = runtime.handle(request).reply.unwrap();

        let decoded = decimesh_io::read_glb(&result.output_buffer).unwrap();
        assert_eq!(decoded.nodes, doc.nodes);
        assert_eq!(decoded.scenes, doc.scenes);
        assert_eq!(decoded.scene, Some(0));
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let mut runtime = WorkerRuntime::new(&WorkerConfig::default());
        let response = runtime.handle(request(2, b"not a mesh".to_vec()));
        assert_eq!(response.id, CorrelationId::new(2));
        assert!(response.reply.unwrap_err().starts_with("Decode error"));
    }

    #[test]
    fn test_panic_is_caught_and_worker_continues() {
        let mut runtime = WorkerRuntime::new(&WorkerConfig::default())
            .with_adapter(SimplifierAdapter::new(PanickingEngine));

        let message = runtime.handle(request(3, quad_glb())).reply.unwrap_err();
        assert_eq!(message, "decimation job panicked: engine exploded");

        let response = runtime.handle(request(4, b"junk".to_vec()));
        assert_eq!(response.id, CorrelationId::new(4));
        assert!(response.reply.is_err());
    }

    #[test]
    fn test_not_ready_after_decode() {
        let mut runtime = WorkerRuntime::new(&WorkerConfig::default())
            .with_adapter(SimplifierAdapter::new(NeverReady));

        let message = runtime.handle(request(5, quad_glb())).reply.unwrap_err();
        assert_eq!(message, "Simplifier not ready: engine unavailable");

        // Decoding comes first, so malformed input still reports a decode error
        let message = runtime.handle(request(6, b"junk".to_vec())).reply.unwrap_err();
        assert!(message.starts_with("Decode error"));
    }

    #[test]
    fn test_spawned_worker_is_fifo() {
        let channels = WorkerRuntime::new(&WorkerConfig::default())
            .spawn(&WorkerConfig::default())
            .unwrap();

        for id in 1..=3 {
            channels.requests.send(request(id, quad_glb())).unwrap();
        }
        let ids: Vec<u64> = (0..3)
            .map(|_| channels.responses.recv().unwrap().id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        drop(channels.requests);
        channels.thread.join().unwrap();
    }
}
