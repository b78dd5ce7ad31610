// src/dispatch/transport.rs

use crate::types::MotorCommand;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Per-send failures. All of them are recoverable.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("not connected to broker")]
    NotConnected,

    #[error("robot answered with HTTP status {0}")]
    Status(u16),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

/// Delivers one motor command to the robot.
#[async_trait]
pub trait MotorTransport: Send {
    fn name(&self) -> &'static str;

    async fn send(&mut self, command: MotorCommand) -> Result<(), TransportError>;
}

/// Logs commands instead of sending them
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl MotorTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&mut self, command: MotorCommand) -> Result<(), TransportError> {
        info!(
            "🛞 RightSpeed = {}, LeftSpeed = {}",
            command.right_speed, command.left_speed
        );
        Ok(())
    }
}
