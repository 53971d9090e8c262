//! End-to-end tests driving a whole [`Bridge`] with a mock engine.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use mapbridge_middleware::{EventBus, EventHandler};
use mapbridge_params::defaults::WORKING_DIRECTORY;
use mapbridge_params::{MemoryParamStore, ParamStore, SyncState};
use mapbridge_runtime::{Bridge, BridgeConfig, Engine};
use mapbridge_types::{
    BridgeError, ControlCommand, Event, EventKind, EventPayload, ExtendedStatistics, Header,
    ImageMsg, KeyPoint, ParameterTable, Statistics,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(100);

/// Records every event it receives and answers each frame with a snapshot.
struct MockEngine {
    seen: mpsc::UnboundedSender<Event>,
    bus: OnceLock<EventBus>,
    defaults: ParameterTable,
    delay: Duration,
}

#[async_trait]
impl EventHandler for MockEngine {
    fn name(&self) -> &str {
        "mock-engine"
    }

    async fn handle(&self, event: &Event) -> Result<(), BridgeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let (EventPayload::FrameIngested(frame), Some(bus)) = (&event.payload, self.bus.get()) {
            bus.post(Event::new(
                "mock-engine",
                EventPayload::EngineResult(Arc::new(Statistics::new(frame.width as i32, -1))),
            ));
        }
        let _ = self.seen.send(event.clone());
        Ok(())
    }
}

impl Engine for MockEngine {
    fn default_parameters(&self) -> ParameterTable {
        self.defaults.clone()
    }
}

struct Harness {
    dir: tempfile::TempDir,
    store: Arc<MemoryParamStore>,
    bridge: Bridge,
    seen: mpsc::UnboundedReceiver<Event>,
}

impl Harness {
    fn start() -> Self {
        Self::start_with(|_| {}, Duration::ZERO)
    }

    fn start_with(tweak: impl FnOnce(&mut BridgeConfig), delay: Duration) -> Self {
        let dir = tempfile::tempdir().expect("tmp dir");
        let (tx, seen) = mpsc::unbounded_channel();
        let defaults: ParameterTable = [
            ("K", "default".to_string()),
            ("Mem/STMSize", "10".to_string()),
            (WORKING_DIRECTORY, dir.path().display().to_string()),
        ]
        .into_iter()
        .collect();
        let engine = Arc::new(MockEngine {
            seen: tx,
            bus: OnceLock::new(),
            defaults,
            delay,
        });

        let mut config = BridgeConfig {
            parameters_file: dir.path().join("parameters.toml"),
            ..BridgeConfig::default()
        };
        tweak(&mut config);

        let store = Arc::new(MemoryParamStore::new());
        let bridge = Bridge::start(engine.clone(), store.clone(), config).expect("bridge starts");
        let _ = engine.bus.set(bridge.bus().clone());

        Self {
            dir,
            store,
            bridge,
            seen,
        }
    }

    async fn next_seen(&mut self) -> Event {
        timeout(WAIT, self.seen.recv())
            .await
            .expect("engine event in time")
            .expect("engine alive")
    }

    /// Next engine event that is not part of startup.
    async fn next_after_startup(&mut self) -> Event {
        loop {
            let event = self.next_seen().await;
            if event.kind() != EventKind::ConfigLoaded {
                return event;
            }
        }
    }

    async fn assert_quiet(&mut self, kind: EventKind) {
        let deadline = tokio::time::Instant::now() + QUIET;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.seen.recv()).await {
            assert_ne!(event.kind(), kind, "unexpected {kind:?} delivered to engine");
        }
    }
}

fn mono_frame(width: u32, data: Vec<u8>) -> ImageMsg {
    ImageMsg {
        header: Header::now("cam"),
        height: 1,
        width,
        encoding: "mono8".to_string(),
        step: width,
        data,
    }
}

#[tokio::test]
async fn startup_pushes_defaults_and_announces_them() {
    let mut h = Harness::start();

    assert_eq!(h.store.get("K").as_deref(), Some("default"));
    assert_eq!(h.bridge.params().state(), SyncState::Running);

    let event = h.next_seen().await;
    match event.payload {
        EventPayload::ConfigLoaded(table) => assert_eq!(table.get("K"), Some("default")),
        other => panic!("expected ConfigLoaded, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_memory_on_start_reaches_engine_alongside_config_loaded() {
    let mut h = Harness::start_with(|c| c.delete_memory_on_start = true, Duration::ZERO);

    let first = h.next_seen().await;
    let second = h.next_seen().await;
    let startup = [&first, &second];

    assert!(
        startup.iter().any(|e| e.kind() == EventKind::ConfigLoaded),
        "ConfigLoaded missing from {startup:?}"
    );
    assert!(
        startup.iter().any(|e| matches!(
            e.payload,
            EventPayload::ControlCommand(ControlCommand::DeleteMemory)
        )),
        "DeleteMemory missing from {startup:?}"
    );
    h.assert_quiet(EventKind::ControlCommand).await;
}

#[tokio::test]
async fn empty_frame_never_reaches_engine() {
    let mut h = Harness::start();

    assert!(!h.bridge.ingest().on_frame_received(&mono_frame(0, Vec::new())));
    h.assert_quiet(EventKind::FrameIngested).await;
}

#[tokio::test]
async fn frame_result_reaches_brief_subscribers() {
    let mut h = Harness::start();
    let mut info_rx = h.bridge.info_channels().info.subscribe();

    assert!(h.bridge.ingest().on_frame_received(&mono_frame(4, vec![1, 2, 3, 4])));
    assert_eq!(h.next_after_startup().await.kind(), EventKind::FrameIngested);

    let info = timeout(WAIT, info_rx.recv()).await.expect("info in time").expect("info");
    assert_eq!(info.ref_id, 4);
    assert_eq!(info.loop_closure_id, -1);
}

#[tokio::test]
async fn brief_snapshot_gives_identifiers_only() {
    let h = Harness::start();
    let mut info_ex_rx = h.bridge.info_channels().info_ex.subscribe();

    h.bridge.bus().post(Event::new(
        "test",
        EventPayload::EngineResult(Arc::new(Statistics::new(5, -1))),
    ));

    let msg = timeout(WAIT, info_ex_rx.recv()).await.expect("infoEx in time").expect("infoEx");
    assert_eq!(msg.ref_id, 5);
    assert_eq!(msg.loop_closure_id, -1);
    assert!(msg.detail.is_none());
}

#[tokio::test]
async fn keypoints_sharing_a_word_are_flattened_in_order() {
    let h = Harness::start();
    let mut info_ex_rx = h.bridge.info_channels().info_ex.subscribe();

    let kp1 = KeyPoint {
        x: 1.0,
        ..KeyPoint::default()
    };
    let kp2 = KeyPoint {
        x: 2.0,
        ..KeyPoint::default()
    };
    let mut ext = ExtendedStatistics::default();
    ext.push_ref_word(7, kp1);
    ext.push_ref_word(7, kp2);

    h.bridge.bus().post(Event::new(
        "test",
        EventPayload::EngineResult(Arc::new(Statistics::new(9, 0).with_extended(ext))),
    ));

    let msg = timeout(WAIT, info_ex_rx.recv()).await.expect("infoEx in time").expect("infoEx");
    let detail = msg.detail.as_ref().expect("detail");
    assert_eq!(detail.ref_words_keys, vec![7, 7]);
    let xs: Vec<f32> = detail.ref_words_values.iter().map(|kp| kp.ptx).collect();
    assert_eq!(xs, vec![1.0, 2.0]);
    assert!(detail.ref_image.is_none());
}

#[tokio::test]
async fn reset_memory_is_delivered_once_without_waiting() {
    let mut h = Harness::start_with(|_| {}, Duration::from_millis(300));

    let started = std::time::Instant::now();
    assert!(h.bridge.commands().reset_memory());
    assert!(started.elapsed() < Duration::from_millis(300));

    let event = h.next_after_startup().await;
    assert!(matches!(
        event.payload,
        EventPayload::ControlCommand(ControlCommand::ResetMemory)
    ));
    h.assert_quiet(EventKind::ControlCommand).await;
}

#[tokio::test]
async fn store_edits_reach_engine_on_update() {
    let mut h = Harness::start();

    h.store.set("Mem/STMSize", "42");
    let merged = h.bridge.parameters_updated().expect("update");
    assert_eq!(merged.get("Mem/STMSize"), Some("42"));

    match h.next_after_startup().await.payload {
        EventPayload::ConfigUpdated(table) => {
            assert_eq!(table.get("Mem/STMSize"), Some("42"));
            assert_eq!(table.get("K"), Some("default"));
        }
        other => panic!("expected ConfigUpdated, got {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_saves_once() {
    let h = Harness::start();
    h.store.set("K", "edited");

    let saved = h.bridge.shutdown().expect("first shutdown saves");
    assert_eq!(saved.get("K"), Some("edited"));
    assert!(h.dir.path().join("parameters.toml").exists());

    assert!(matches!(
        h.bridge.shutdown(),
        Err(BridgeError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn saved_parameters_are_loaded_by_next_bridge() {
    let h = Harness::start();
    h.store.set("Mem/STMSize", "25");
    h.bridge.shutdown().expect("save");

    let path = h.dir.path().join("parameters.toml");
    let second = Harness::start_with(|c| c.parameters_file = path, Duration::ZERO);
    assert_eq!(second.store.get("Mem/STMSize").as_deref(), Some("25"));
}

#[tokio::test]
async fn unreadable_parameter_file_fails_startup() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("parameters.toml");
    std::fs::write(&path, "[Core\n").expect("write");

    let (tx, _rx) = mpsc::unbounded_channel();
    let engine = Arc::new(MockEngine {
        seen: tx,
        bus: OnceLock::new(),
        defaults: ParameterTable::new(),
        delay: Duration::ZERO,
    });
    let config = BridgeConfig {
        parameters_file: path,
        ..BridgeConfig::default()
    };

    let result = Bridge::start(engine, Arc::new(MemoryParamStore::new()), config);
    assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
}
