use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use base64::Engine;
use futures::stream::SplitSink;
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use telemetry::metrics::{DASHBOARD_FRAMES_STREAMED, DASHBOARD_WS_CLIENTS};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use analytics::{RiskStatus, RiskThresholds};

use crate::live::LiveUpdate;
use crate::state::DashboardState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Sent once when a client connects
    Config {
        thresholds: RiskThresholds,
        live_source: Option<String>,
        status_update_interval: u64,
    },
    /// One overlaid live frame, JPEG as base64
    Frame {
        sequence: u64,
        person_count: usize,
        status: RiskStatus,
        image: String,
    },
    /// Periodic status rollup for the header widgets
    Status {
        status: RiskStatus,
        label: String,
        css_class: String,
        person_count: usize,
        density: String,
    },
    Error {
        message: String,
    },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<DashboardState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: DashboardState) {
    DASHBOARD_WS_CLIENTS.inc();
    info!("websocket client connected");

    serve_client(socket, &state).await;

    DASHBOARD_WS_CLIENTS.dec();
    info!("websocket client disconnected");
}

async fn serve_client(socket: WebSocket, state: &DashboardState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.updates.subscribe();
    let status_interval = state.config.status_update_interval.max(1);

    let config_msg = WsMessage::Config {
        thresholds: state.config.thresholds.clone(),
        live_source: state.config.live_source.clone(),
        status_update_interval: status_interval,
    };
    if send_message(&mut sender, &config_msg).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    if stream_update(&mut sender, &update, status_interval).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagged, dropping frames");
                }
                Err(RecvError::Closed) => {
                    let msg = WsMessage::Error {
                        message: "live stream ended".to_string(),
                    };
                    let _ = send_message(&mut sender, &msg).await;
                    break;
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket receive error");
                    break;
                }
            },
        }
    }
}

/// Push one frame message, plus a status rollup every Nth frame.
async fn stream_update(
    sender: &mut SplitSink<WebSocket, Message>,
    update: &LiveUpdate,
    status_interval: u64,
) -> Result<(), ()> {
    let frame_msg = WsMessage::Frame {
        sequence: update.sequence,
        person_count: update.person_count,
        status: update.status,
        image: base64::engine::general_purpose::STANDARD.encode(&update.frame_jpeg),
    };
    send_message(sender, &frame_msg).await?;
    DASHBOARD_FRAMES_STREAMED.inc();

    if update.sequence % status_interval == 0 {
        let status_msg = WsMessage::Status {
            status: update.status,
            label: update.status.label().to_string(),
            css_class: update.status.css_class().to_string(),
            person_count: update.person_count,
            density: analytics::density::density_line(
                update.person_count,
                analytics::density::DEFAULT_MAX_CAPACITY,
            ),
        };
        send_message(sender, &status_msg).await?;
    }

    Ok(())
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> Result<(), ()> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await.map_err(|_| ()),
        Err(_) => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_message_tag() {
        let msg = WsMessage::Config {
            thresholds: RiskThresholds::default(),
            live_source: Some("/dev/video0".to_string()),
            status_update_interval: 10,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "config");
        assert_eq!(json["thresholds"]["warning_threshold"], 20);
        assert_eq!(json["live_source"], "/dev/video0");
    }

    #[test]
    fn test_frame_message_carries_base64_image() {
        let msg = WsMessage::Frame {
            sequence: 7,
            person_count: 12,
            status: RiskStatus::Warning,
            image: base64::engine::general_purpose::STANDARD.encode(b"jpeg-bytes"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "frame");
        assert_eq!(json["status"], "warning");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(json["image"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, b"jpeg-bytes");
    }

    #[test]
    fn test_status_message_labels() {
        let msg = WsMessage::Status {
            status: RiskStatus::Critical,
            label: RiskStatus::Critical.label().to_string(),
            css_class: RiskStatus::Critical.css_class().to_string(),
            person_count: 31,
            density: analytics::density::density_line(31, 100),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["status"], "critical");
        assert_eq!(json["label"], "CRITICAL RISK");
        assert_eq!(json["css_class"], "status-critical");
    }

    #[test]
    fn test_messages_round_trip() {
        let json = r#"{"type":"error","message":"live stream ended"}"#;
        let msg: WsMessage = serde_json::from_str(json).unwrap();
        match msg {
            WsMessage::Error { message } => assert_eq!(message, "live stream ended"),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
