//! rosbridge-style WebSocket gateway.
//!
//! Exposes the bridge's host surface to external processes as JSON text
//! frames:
//!
//! | Client → bridge | Effect |
//! |---|---|
//! | `{"op":"subscribe","topic":"info"}` | receive brief statistics |
//! | `{"op":"subscribe","topic":"infoEx"}` | receive detailed statistics |
//! | `{"op":"subscribe","topic":"engine"}` | receive engine-bound events |
//! | `{"op":"unsubscribe","topic":...}` | stop receiving a topic |
//! | `{"op":"call_service","service":"resetMemory"}` | dispatch a command |
//! | `{"op":"publish","topic":"image","msg":{...}}` | ingest a frame |
//! | `{"op":"publish","topic":"parameters_updated"}` | config-change notification |
//! | `{"op":"publish","topic":"engine_result","msg":{...}}` | statistics from a remote engine |
//!
//! Outbound traffic is `{"op":"publish","topic":...,"msg":...}` and, for
//! service calls, `{"op":"service_response","service":...,"result":true}`.
//! Each subscribed topic holds one receiver on the matching outbound
//! channel, so connected clients count towards the statistics publisher's
//! subscriber gate.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use mapbridge_middleware::OutboundChannel;
use mapbridge_middleware::stats_publisher::{INFO_EX_TOPIC, INFO_TOPIC};
use mapbridge_types::{
    BridgeError, ControlCommand, Event, EventPayload, ImageMsg, Info, InfoEx, Statistics,
};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::bridge::Bridge;
use crate::remote_engine::ENGINE_TOPIC;

pub const GATEWAY_SOURCE: &str = "mapbridge-runtime::gateway";

pub const IMAGE_TOPIC: &str = "image";
pub const PARAMETERS_UPDATED_TOPIC: &str = "parameters_updated";
pub const ENGINE_RESULT_TOPIC: &str = "engine_result";

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientOp {
    Subscribe {
        topic: String,
    },
    Unsubscribe {
        topic: String,
    },
    CallService {
        service: String,
    },
    Publish {
        topic: String,
        #[serde(default)]
        msg: serde_json::Value,
    },
}

#[derive(Serialize)]
#[serde(tag = "op", rename = "publish")]
struct Publish<'a, T> {
    topic: &'a str,
    msg: &'a T,
}

#[derive(Serialize)]
#[serde(tag = "op", rename = "service_response")]
struct ServiceResponse<'a> {
    service: &'a str,
    result: bool,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, BridgeError> {
    serde_json::to_string(value).map_err(|e| BridgeError::Encode(e.to_string()))
}

/// Serves the bridge to WebSocket clients.
#[derive(Clone)]
pub struct Gateway {
    bridge: Arc<Bridge>,
    engine: OutboundChannel<Event>,
}

impl Gateway {
    /// `engine` is the channel engine-bound events are forwarded to, usually
    /// [`RemoteEngine::channel`](crate::RemoteEngine::channel).
    pub fn new(bridge: Arc<Bridge>, engine: OutboundChannel<Event>) -> Self {
        Self { bridge, engine }
    }

    /// Bind `addr` and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Transport`] if the listener cannot be bound.
    pub async fn run(self, addr: SocketAddr) -> Result<(), BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Transport(format!("gateway bind error on {addr}: {e}")))?;
        info!(%addr, "gateway listening");
        self.serve(listener).await
    }

    /// Accept clients from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), BridgeError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let gateway = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = gateway.handle_client(stream, peer).await {
                            error!(%peer, error = %e, "gateway client error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "gateway accept error"),
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), BridgeError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| BridgeError::Transport(format!("handshake from {peer}: {e}")))?;
        debug!(%peer, "gateway client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut session = Session::new(self.clone());

        loop {
            let step = tokio::select! {
                result = recv_from(&mut session.info) => Step::Info(result),
                result = recv_from(&mut session.info_ex) => Step::InfoEx(result),
                result = recv_from(&mut session.engine) => Step::Engine(result),
                msg = ws_rx.next() => Step::Client(msg),
            };

            let outgoing = match step {
                Step::Info(result) => forward(&mut session.info, INFO_TOPIC, result, peer)?,
                Step::InfoEx(result) => forward(&mut session.info_ex, INFO_EX_TOPIC, result, peer)?,
                Step::Engine(result) => forward(&mut session.engine, ENGINE_TOPIC, result, peer)?,
                Step::Client(Some(Ok(Message::Text(text)))) => session.handle_text(text.as_str())?,
                Step::Client(Some(Ok(Message::Close(_))) | Some(Err(_)) | None) => break,
                Step::Client(Some(Ok(_))) => None,
            };

            if let Some(json) = outgoing {
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }

        debug!(%peer, "gateway client disconnected");
        Ok(())
    }
}

enum Step {
    Info(Result<Info, RecvError>),
    InfoEx(Result<Arc<InfoEx>, RecvError>),
    Engine(Result<Event, RecvError>),
    Client(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

/// Per-connection topic subscriptions.
struct Session {
    gateway: Gateway,
    info: Option<broadcast::Receiver<Info>>,
    info_ex: Option<broadcast::Receiver<Arc<InfoEx>>>,
    engine: Option<broadcast::Receiver<Event>>,
}

impl Session {
    fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            info: None,
            info_ex: None,
            engine: None,
        }
    }

    /// Apply one client message, returning the reply to send, if any.
    fn handle_text(&mut self, text: &str) -> Result<Option<String>, BridgeError> {
        let op = match serde_json::from_str::<ClientOp>(text) {
            Ok(op) => op,
            Err(e) => {
                debug!(error = %e, "ignoring malformed client message");
                return Ok(None);
            }
        };

        match op {
            ClientOp::Subscribe { topic } => self.subscribe(&topic),
            ClientOp::Unsubscribe { topic } => self.unsubscribe(&topic),
            ClientOp::CallService { service } => return self.call_service(&service),
            ClientOp::Publish { topic, msg } => self.publish(&topic, msg),
        }
        Ok(None)
    }

    fn subscribe(&mut self, topic: &str) {
        let bridge = &self.gateway.bridge;
        match topic {
            INFO_TOPIC => self.info = Some(bridge.info_channels().info.subscribe()),
            INFO_EX_TOPIC => self.info_ex = Some(bridge.info_channels().info_ex.subscribe()),
            ENGINE_TOPIC => self.engine = Some(self.gateway.engine.subscribe()),
            other => debug!(topic = other, "subscribe to unknown topic ignored"),
        }
    }

    fn unsubscribe(&mut self, topic: &str) {
        match topic {
            INFO_TOPIC => self.info = None,
            INFO_EX_TOPIC => self.info_ex = None,
            ENGINE_TOPIC => self.engine = None,
            other => debug!(topic = other, "unsubscribe from unknown topic ignored"),
        }
    }

    fn call_service(&self, service: &str) -> Result<Option<String>, BridgeError> {
        let command = match service.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "ignoring service call");
                return Ok(None);
            }
        };
        let result = self.gateway.bridge.commands().dispatch(command);
        to_json(&ServiceResponse { service, result }).map(Some)
    }

    fn publish(&self, topic: &str, msg: serde_json::Value) {
        let bridge = &self.gateway.bridge;
        match topic {
            IMAGE_TOPIC => match serde_json::from_value::<ImageMsg>(msg) {
                Ok(wire) => {
                    bridge.ingest().on_frame_received(&wire);
                }
                Err(e) => debug!(error = %e, "ignoring malformed image"),
            },
            PARAMETERS_UPDATED_TOPIC => {
                if let Err(e) = bridge.parameters_updated() {
                    warn!(error = %e, "parameter update rejected");
                }
            }
            ENGINE_RESULT_TOPIC => match serde_json::from_value::<Statistics>(msg) {
                Ok(stats) => {
                    bridge.bus().post(Event::new(
                        GATEWAY_SOURCE,
                        EventPayload::EngineResult(Arc::new(stats)),
                    ));
                }
                Err(e) => debug!(error = %e, "ignoring malformed engine result"),
            },
            other => debug!(topic = other, "publish to unknown topic ignored"),
        }
    }
}

/// Next message of an optional subscription; pending forever when there is
/// none.
async fn recv_from<T: Clone>(rx: &mut Option<broadcast::Receiver<T>>) -> Result<T, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn forward<T: Serialize>(
    slot: &mut Option<broadcast::Receiver<T>>,
    topic: &str,
    result: Result<T, RecvError>,
    peer: SocketAddr,
) -> Result<Option<String>, BridgeError> {
    match result {
        Ok(msg) => to_json(&Publish { topic, msg: &msg }).map(Some),
        Err(RecvError::Lagged(n)) => {
            warn!(%peer, topic, lagged_by = n, "gateway client lagged");
            Ok(None)
        }
        Err(RecvError::Closed) => {
            *slot = None;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeConfig;
    use crate::remote_engine::RemoteEngine;
    use mapbridge_params::MemoryParamStore;
    use mapbridge_types::EventKind;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        bridge: Arc<Bridge>,
        gateway: Gateway,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tmp dir");
        let engine = Arc::new(RemoteEngine::new(16));
        let config = BridgeConfig {
            parameters_file: dir.path().join("parameters.toml"),
            ..BridgeConfig::default()
        };
        let bridge = Arc::new(
            Bridge::start(engine.clone(), Arc::new(MemoryParamStore::new()), config)
                .expect("bridge"),
        );
        let gateway = Gateway::new(bridge.clone(), engine.channel().clone());
        Fixture {
            _dir: dir,
            bridge,
            gateway,
        }
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_track_channel_subscribers() {
        let fx = fixture();
        let mut session = Session::new(fx.gateway.clone());
        let channels = fx.bridge.info_channels();

        session.handle_text(r#"{"op":"subscribe","topic":"infoEx"}"#).unwrap();
        assert_eq!(channels.info_ex.subscriber_count(), 1);
        assert_eq!(channels.info.subscriber_count(), 0);

        session.handle_text(r#"{"op":"unsubscribe","topic":"infoEx"}"#).unwrap();
        assert_eq!(channels.info_ex.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn call_service_dispatches_and_replies() {
        let fx = fixture();
        let mut rx = fx.bridge.bus().subscribe_to(EventKind::ControlCommand);
        let mut session = Session::new(fx.gateway.clone());

        let reply = session
            .handle_text(r#"{"op":"call_service","service":"dumpPrediction"}"#)
            .unwrap()
            .expect("reply");

        let json: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["op"], "service_response");
        assert_eq!(json["service"], "dumpPrediction");
        assert_eq!(json["result"], true);

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::ControlCommand(ControlCommand::DumpPrediction)
        ));
    }

    #[tokio::test]
    async fn published_image_is_ingested() {
        let fx = fixture();
        let mut rx = fx.bridge.bus().subscribe_to(EventKind::FrameIngested);
        let mut session = Session::new(fx.gateway.clone());

        let msg = r#"{"op":"publish","topic":"image","msg":{
            "header":{"stamp":"2024-01-01T00:00:00Z","frame_id":"cam"},
            "height":1,"width":2,"encoding":"mono8","step":2,"data":[1,2]}}"#;
        session.handle_text(msg).unwrap();

        let event = rx.recv().await.unwrap();
        match event.payload {
            EventPayload::FrameIngested(frame) => assert_eq!(frame.data, vec![1, 2]),
            other => panic!("expected FrameIngested, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_and_malformed_messages_are_ignored() {
        let fx = fixture();
        let mut session = Session::new(fx.gateway.clone());

        assert!(session.handle_text("not json").unwrap().is_none());
        assert!(session.handle_text(r#"{"op":"launch"}"#).unwrap().is_none());
        assert!(session
            .handle_text(r#"{"op":"call_service","service":"formatDisk"}"#)
            .unwrap()
            .is_none());
        assert!(session
            .handle_text(r#"{"op":"subscribe","topic":"nowhere"}"#)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn websocket_client_receives_info() {
        let fx = fixture();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(fx.gateway.clone().serve(listener));

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("connect");
        ws.send(Message::text(r#"{"op":"subscribe","topic":"info"}"#.to_string()))
            .await
            .unwrap();

        let channels = fx.bridge.info_channels().clone();
        tokio::time::timeout(Duration::from_secs(2), async {
            while channels.info.subscriber_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client subscribed");

        fx.bridge.bus().post(Event::new(
            "test",
            EventPayload::EngineResult(Arc::new(Statistics::new(3, 1))),
        ));

        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("frame ok");
        let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(json["op"], "publish");
        assert_eq!(json["topic"], "info");
        assert_eq!(json["msg"]["ref_id"], 3);
        assert_eq!(json["msg"]["loop_closure_id"], 1);
    }
}
