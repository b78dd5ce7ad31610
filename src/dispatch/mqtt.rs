// src/dispatch/mqtt.rs
//
// Publishes right/left speeds to two topics with QoS 1. The network event
// loop runs in a background task and only reports link state back through
// an atomic flag; the dispatcher stays the single owner of send timing.

use super::transport::{MotorTransport, TransportError};
use crate::types::{MotorCommand, MqttConfig};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    right_topic: String,
    left_topic: String,
    event_task: JoinHandle<()>,
}

impl MqttTransport {
    /// Must be called inside a tokio runtime. Never fails: the broker link is
    /// established (and re-established) by the background event loop.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

        let (client, event_loop) = AsyncClient::new(options, 10);
        let connected = Arc::new(AtomicBool::new(false));

        info!(
            "📡 MQTT broker {}:{} (right -> {}, left -> {})",
            config.broker, config.port, config.right_topic, config.left_topic
        );

        let event_task = tokio::spawn(drive_event_loop(
            event_loop,
            connected.clone(),
            Duration::from_millis(config.reconnect_delay_ms),
        ));

        Self {
            client,
            connected,
            right_topic: config.right_topic.clone(),
            left_topic: config.left_topic.clone(),
            event_task,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("✓ Connected to MQTT broker");
                    connected.store(true, Ordering::Relaxed);
                } else {
                    warn!("MQTT broker refused connection: {:?}", ack.code);
                    connected.store(false, Ordering::Relaxed);
                }
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                debug!("Message {} successfully published", ack.pkid);
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::Relaxed) {
                    warn!("MQTT connection lost: {}", e);
                } else {
                    debug!("MQTT connect attempt failed: {}", e);
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

#[async_trait]
impl MotorTransport for MqttTransport {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn send(&mut self, command: MotorCommand) -> Result<(), TransportError> {
        // Publishing while offline would queue stale speeds for later replay
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.client
            .publish(
                &self.right_topic,
                QoS::AtLeastOnce,
                false,
                command.right_speed.to_string(),
            )
            .await?;
        self.client
            .publish(
                &self.left_topic,
                QoS::AtLeastOnce,
                false,
                command.left_speed.to_string(),
            )
            .await?;

        debug!(
            "Data sent via MQTT: RightSpeed = {}, LeftSpeed = {}",
            command.right_speed, command.left_speed
        );
        Ok(())
    }
}
