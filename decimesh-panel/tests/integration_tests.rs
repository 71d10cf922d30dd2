//! Integration tests for decimesh-panel
//!
//! The controller runs against a scripted worker that records every request
//! it receives and answers after a fixed delay. Debounce timing runs on
//! tokio's paused clock.

use decimesh_core::{Mesh, MeshDocument, MeshStats, Primitive};
use decimesh_io::FileFetcher;
use decimesh_panel::*;
use decimesh_worker::{
    DecimationResult, Decimator, RequestKind, RpcChannel, WorkerConfig, WorkerRequest,
    WorkerResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

const FAKE_GLB: &[u8] = b"glTF-fake";

#[derive(Debug, Clone, Copy)]
struct SeenCall {
    ratio: f32,
    error: f32,
    at: Instant,
}

/// Worker stand-in: processes requests one at a time, taking `delay` each,
/// and fails every request whose ratio is at least `fail_from`
fn scripted_decimator(
    delay: Duration,
    fail_from: f32,
) -> (Arc<Decimator>, mpsc::UnboundedReceiver<SeenCall>) {
    let (req_tx, req_rx) = flume::unbounded::<WorkerRequest>();
    let (res_tx, res_rx) = flume::unbounded();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok(request) = req_rx.recv_async().await {
            let RequestKind::Decimate(payload) = request.kind;
            let _ = seen_tx.send(SeenCall {
                ratio: payload.ratio,
                error: payload.error,
                at: Instant::now(),
            });
            sleep(delay).await;

            let response = if payload.ratio >= fail_from {
                WorkerResponse::err(request.id, "Decode error: boom")
            } else {
                let after = (1200.0 * payload.ratio).round() as u64;
                WorkerResponse::ok(
                    request.id,
                    DecimationResult {
                        output_buffer: FAKE_GLB.to_vec(),
                        before: MeshStats::new(1200, 800),
                        after: MeshStats::new(after, after),
                    },
                )
            };
            if res_tx.send(response).is_err() {
                break;
            }
        }
    });

    let channel = RpcChannel::connect(req_tx, res_rx, None);
    (Arc::new(Decimator::from_channel(channel)), seen_rx)
}

fn start(
    decimator: Arc<Decimator>,
    config: ControllerConfig,
) -> (PanelHandle, mpsc::UnboundedReceiver<PanelEvent>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let fetcher = Arc::new(FileFetcher::new());
    let handle = PanelController::new(decimator, fetcher, config, events_tx).spawn();
    handle.set_source(MeshSource::Bytes(Arc::new(b"mesh".to_vec())));
    (handle, events_rx)
}

fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

fn statuses(events: &[PanelEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PanelEvent::Status(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn ratios(calls: &[SeenCall]) -> Vec<f32> {
    calls.iter().map(|c| c.ratio).collect()
}

async fn next_status(
    events: &mut mpsc::UnboundedReceiver<PanelEvent>,
    wanted: &str,
) -> Vec<PanelEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = events.recv().await {
            let done = matches!(&event, PanelEvent::Status(text) if text == wanted);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .expect("status never arrived");
    seen
}

#[tokio::test(start_paused = true)]
async fn test_burst_within_window_sends_one_request_with_last_values() {
    let (decimator, mut calls) = scripted_decimator(Duration::from_secs(1), 2.0);
    let (handle, mut events) = start(decimator, ControllerConfig::default());

    for ratio in [0.1, 0.2, 0.3, 0.4, 0.5] {
        handle.set_ratio(ratio);
        sleep(Duration::from_millis(50)).await;
    }
    sleep(Duration::from_secs(3)).await;

    let calls = drain(&mut calls);
    assert_eq!(ratios(&calls), vec![0.5]);
    assert_eq!(calls[0].error, 0.05);

    let events = drain(&mut events);
    assert_eq!(statuses(&events), vec![STATUS_SIMPLIFYING, STATUS_PREVIEW_UPDATED]);
    assert!(events.iter().any(|e| matches!(
        e,
        PanelEvent::Stats(text) if text == "before: 1,200 tris • after: 600 tris"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        PanelEvent::Preview { result, wireframe: true } if result.output_buffer == FAKE_GLB
    )));
}

#[tokio::test(start_paused = true)]
async fn test_changes_during_flight_coalesce_into_one_follow_up() {
    let (decimator, mut calls) = scripted_decimator(Duration::from_secs(1), 2.0);
    let (handle, mut events) = start(decimator, ControllerConfig::default());

    handle.set_ratio(0.1);
    sleep(Duration::from_millis(400)).await;
    handle.set_ratio(0.2);
    sleep(Duration::from_millis(100)).await;
    handle.set_ratio(0.3);
    sleep(Duration::from_secs(4)).await;

    let calls = drain(&mut calls);
    assert_eq!(ratios(&calls), vec![0.1, 0.3]);
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(1));

    let updates = statuses(&drain(&mut events))
        .into_iter()
        .filter(|s| s == STATUS_PREVIEW_UPDATED)
        .count();
    assert_eq!(updates, 2);
}

#[tokio::test(start_paused = true)]
async fn test_preview_button_skips_debounce() {
    let (decimator, mut calls) = scripted_decimator(Duration::from_millis(500), 2.0);
    let (handle, _events) = start(decimator, ControllerConfig::default());
    let started = Instant::now();

    handle.set_ratio(0.7);
    handle.preview();
    // A second press while the first preview runs only queues one follow-up
    sleep(Duration::from_millis(100)).await;
    handle.preview();
    handle.preview();
    sleep(Duration::from_secs(3)).await;

    let calls = drain(&mut calls);
    assert_eq!(ratios(&calls), vec![0.7, 0.7]);
    assert!(calls[0].at - started < Duration::from_millis(350));
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_reported_and_controller_continues() {
    let (decimator, mut calls) = scripted_decimator(Duration::from_millis(200), 0.9);
    let (handle, mut events) = start(decimator, ControllerConfig::default());

    handle.set_ratio(0.95);
    handle.preview();
    sleep(Duration::from_secs(1)).await;
    handle.set_ratio(0.5);
    handle.preview();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(ratios(&drain(&mut calls)), vec![0.95, 0.5]);
    assert_eq!(
        statuses(&drain(&mut events)),
        vec![
            STATUS_SIMPLIFYING_PREVIEW.to_string(),
            "Failed: Decode error: boom".to_string(),
            STATUS_SIMPLIFYING_PREVIEW.to_string(),
            STATUS_PREVIEW_UPDATED.to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_slider_value_never_reaches_worker() {
    let (decimator, mut calls) = scripted_decimator(Duration::from_millis(200), 2.0);
    let (handle, mut events) = start(decimator, ControllerConfig::default());

    handle.set_ratio(0.0);
    sleep(Duration::from_secs(1)).await;

    assert!(drain(&mut calls).is_empty());
    let statuses = statuses(&drain(&mut events));
    assert_eq!(statuses.len(), 2);
    assert!(statuses[1].starts_with("Failed: Invalid parameters"), "{:?}", statuses);
}

#[tokio::test(start_paused = true)]
async fn test_missing_source_fails_without_request() {
    let (decimator, mut calls) = scripted_decimator(Duration::from_millis(200), 2.0);
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let handle = PanelController::new(
        decimator,
        Arc::new(FileFetcher::new()),
        ControllerConfig::default(),
        events_tx,
    )
    .spawn();

    handle.preview();
    sleep(Duration::from_millis(100)).await;

    assert!(drain(&mut calls).is_empty());
    assert_eq!(
        statuses(&drain(&mut events)),
        vec![
            STATUS_SIMPLIFYING_PREVIEW.to_string(),
            "Failed: no mesh source selected".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_wireframe_toggle_is_forwarded() {
    let (decimator, _calls) = scripted_decimator(Duration::from_millis(100), 2.0);
    let (handle, mut events) = start(decimator, ControllerConfig::default());

    handle.set_wireframe(false);
    handle.preview();
    sleep(Duration::from_secs(1)).await;

    let events = drain(&mut events);
    assert!(matches!(events[0], PanelEvent::Wireframe(false)));
    assert!(events
        .iter()
        .any(|e| matches!(e, PanelEvent::Preview { wireframe: false, .. })));
}

#[tokio::test]
async fn test_download_is_not_gated_by_preview() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("lod.glb");
    let (decimator, mut calls) = scripted_decimator(Duration::from_millis(200), 2.0);
    let (handle, mut events) = start(
        decimator,
        ControllerConfig::default().with_download_path(&target),
    );

    handle.preview();
    handle.download();
    let seen = next_status(&mut events, STATUS_DOWNLOADED).await;

    let seen = statuses(&seen);
    assert_eq!(&seen[..2], &[STATUS_SIMPLIFYING_PREVIEW, STATUS_SIMPLIFYING_DOWNLOAD]);
    assert!(seen.contains(&STATUS_PREVIEW_UPDATED.to_string()));
    assert_eq!(std::fs::read(&target).unwrap(), FAKE_GLB);

    let first = calls.recv().await.unwrap();
    let second = calls.recv().await.unwrap();
    assert_eq!((first.ratio, second.ratio), (0.3, 0.3));
    handle.close().await;
}

#[tokio::test]
async fn test_preview_with_real_worker() {
    let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
    let doc = MeshDocument::from_meshes(vec![Mesh::new(vec![Primitive::triangles(
        positions,
        vec![0, 1, 2, 2, 1, 3],
    )])]);
    let glb = decimesh_io::write_glb(&doc).unwrap();

    let decimator = Arc::new(Decimator::spawn(WorkerConfig::default()).unwrap());
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let handle = PanelController::new(
        decimator,
        Arc::new(FileFetcher::new()),
        ControllerConfig::default(),
        events_tx,
    )
    .spawn();
    handle.set_source(MeshSource::Bytes(Arc::new(glb)));
    handle.preview();

    let seen = next_status(&mut events, STATUS_PREVIEW_UPDATED).await;
    let result = seen
        .iter()
        .find_map(|e| match e {
            PanelEvent::Preview { result, .. } => Some(result.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(result.before, MeshStats::new(2, 4));
    assert!(result.after.triangles >= 1);
    handle.close().await;
}
