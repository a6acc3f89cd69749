//! MQTT publishing: raw JPEG frames at QoS 0, alert JSON at QoS 1.

use analytics::AlertEvent;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use telemetry::metrics::MONITOR_PUBLISH_FAILURES;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;

const MAX_PACKET_BYTES: usize = 2 * 1024 * 1024;

pub struct FramePublisher {
    client: AsyncClient,
    source_id: String,
    frame_topic: String,
    alert_topic: String,
}

impl FramePublisher {
    /// Connect to the broker and spawn the client event loop. The loop
    /// keeps polling through errors so the broker can come and go
    /// without taking the capture loop down.
    pub fn connect(config: &Config) -> Self {
        let client_id = format!("crowdwatch-monitor-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(
            client_id,
            &config.mqtt_broker_host,
            config.mqtt_broker_port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        options.set_max_packet_size(MAX_PACKET_BYTES, MAX_PACKET_BYTES);

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(_) => {}
                    Err(e) => {
                        debug!("MQTT eventloop error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        info!(
            broker = %config.mqtt_broker_host,
            port = config.mqtt_broker_port,
            frame_topic = %config.mqtt_frame_topic,
            alert_topic = %config.mqtt_alert_topic,
            "MQTT publisher connected"
        );

        Self {
            client,
            source_id: config.source_id.clone(),
            frame_topic: config.mqtt_frame_topic.clone(),
            alert_topic: config.mqtt_alert_topic.clone(),
        }
    }

    /// Publish an overlaid JPEG frame. Failures are counted and logged,
    /// never fatal.
    pub async fn publish_frame(&self, jpeg: &[u8]) {
        if let Err(e) = self
            .client
            .publish(
                self.frame_topic.clone(),
                QoS::AtMostOnce,
                false,
                jpeg.to_vec(),
            )
            .await
        {
            MONITOR_PUBLISH_FAILURES
                .with_label_values(&[&self.source_id, "frame"])
                .inc();
            warn!(error = %e, topic = %self.frame_topic, "failed to publish frame");
        }
    }

    /// Publish an alert event as JSON.
    pub async fn publish_alert(&self, alert: &AlertEvent) {
        let payload = match serde_json::to_vec(alert) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialize alert");
                return;
            }
        };

        match self
            .client
            .publish(self.alert_topic.clone(), QoS::AtLeastOnce, false, payload)
            .await
        {
            Ok(_) => {
                info!(
                    alert_id = %alert.id,
                    persons = alert.person_count,
                    topic = %self.alert_topic,
                    "alert published"
                );
            }
            Err(e) => {
                MONITOR_PUBLISH_FAILURES
                    .with_label_values(&[&self.source_id, "alert"])
                    .inc();
                warn!(error = %e, topic = %self.alert_topic, "failed to publish alert");
            }
        }
    }
}
