//! Integration tests: frames sent over real loopback UDP, received,
//! reassembled and rendered by the threaded contexts.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use strobe_core::{
    EngineConfig, FrameEngine, IngestLoop, PixelSink, RenderScheduler, Renderer, packetize,
};
use strobe_display::config::StrobeConfig;
use strobe_display::renderer::CountingPanel;
use strobe_display::service::DisplayService;
use strobe_display::source::UdpPacketSource;

// ── Helpers ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CapturingRenderer {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Renderer for CapturingRenderer {
    fn render(&mut self, frame: &[u8], _sink: &mut dyn PixelSink) -> bool {
        self.frames.lock().unwrap().push(frame.to_vec());
        true
    }
}

fn frame(id: u32, len: usize) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend((0..len - 4).map(|i| ((id as usize + i) % 0x7F) as u8));
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

// ── Loopback ─────────────────────────────────────────────────────

#[test]
fn test_frames_over_loopback_are_rendered() {
    let config = EngineConfig {
        max_frame_size: 8_192,
        max_packets: 32,
        ..EngineConfig::default()
    };
    let engine = Arc::new(FrameEngine::new(config).unwrap());
    let source = UdpPacketSource::bind("127.0.0.1:0".parse().unwrap(), 0).unwrap();
    let target = source.local_addr().unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let mut ingest = IngestLoop::new(Arc::clone(&engine), source, 1500, 3).unwrap();
    let ingest_thread = thread::spawn({
        let running = Arc::clone(&running);
        move || ingest.run(&running, Duration::from_millis(1))
    });

    let renderer = CapturingRenderer::default();
    let mut scheduler =
        RenderScheduler::new(Arc::clone(&engine), renderer.clone(), CountingPanel::default());
    let render_thread = thread::spawn({
        let running = Arc::clone(&running);
        move || scheduler.run(&running)
    });

    let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut sent = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut id = 0u32;
    while renderer.frames.lock().unwrap().len() < 3 && Instant::now() < deadline {
        id += 1;
        let body = frame(id, 3_000);
        for pkt in packetize(id, &body, 1_000).unwrap() {
            tx.send_to(&pkt, target).unwrap();
        }
        sent.push(body);
        thread::sleep(Duration::from_millis(40));
    }

    running.store(false, Ordering::Relaxed);
    ingest_thread.join().unwrap();
    render_thread.join().unwrap();

    let frames = renderer.frames.lock().unwrap();
    assert!(frames.len() >= 3, "only {} frames rendered", frames.len());
    for f in frames.iter() {
        assert!(sent.contains(f));
    }
    assert!(engine.metrics().frames_rendered() >= 3);
}

// ── Service lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn test_service_starts_and_stops() {
    let mut config = StrobeConfig::default();
    config.network.bind_address = "127.0.0.1:0".into();
    config.monitor.interval_ms = 20;

    let service = Arc::new(DisplayService::new(config));
    let stop = service.stop_handle();
    let task = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.run().await }
    });

    // Let setup finish and the contexts spin up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(service.is_running());
    assert!(!task.is_finished());

    stop.store(false, Ordering::SeqCst);
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("service did not stop")
        .expect("service task panicked");
    assert!(result.is_ok());
    assert!(!service.is_running());
}
