// src/dispatch/mod.rs
//
// Rate-limited motor command dispatch. A command goes out only when the
// send interval has passed since the last *successful* send; failed sends
// leave the timestamp alone so the next frame retries.

pub mod http;
pub mod mqtt;
pub mod transport;

pub use transport::{LogTransport, MotorTransport, TransportError};

use crate::types::{DispatchConfig, MotorCommand, TransportConfig};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};

/// Throttling memory, one per dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispatchState {
    /// Unset until the first successful send
    pub last_sent_timestamp: Option<f64>,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Sent,
    Throttled,
    Failed(TransportError),
}

pub struct CommandDispatcher {
    transport: Box<dyn MotorTransport>,
    send_interval: f64,
    timeout: Duration,
    state: DispatchState,
}

impl CommandDispatcher {
    pub fn new(transport: Box<dyn MotorTransport>, send_interval: f64, timeout: Duration) -> Self {
        Self {
            transport,
            send_interval,
            timeout,
            state: DispatchState::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    fn is_due(&self, now: f64) -> bool {
        match self.state.last_sent_timestamp {
            None => true,
            Some(last) => now - last >= self.send_interval,
        }
    }

    /// Never returns an error: failures are logged and reported in the outcome.
    pub async fn dispatch(&mut self, command: MotorCommand, now: f64) -> DispatchOutcome {
        if !self.is_due(now) {
            return DispatchOutcome::Throttled;
        }

        let result = match tokio::time::timeout(self.timeout, self.transport.send(command)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                self.state.last_sent_timestamp = Some(now);
                debug!(
                    "Sent via {}: left={} right={}",
                    self.transport.name(),
                    command.left_speed,
                    command.right_speed
                );
                DispatchOutcome::Sent
            }
            Err(e) => {
                warn!("⚠️  Failed to send motor command via {}: {}", self.transport.name(), e);
                DispatchOutcome::Failed(e)
            }
        }
    }
}

/// Build the configured transport. Only client construction can fail here;
/// an unreachable robot is a per-send error.
pub fn build_transport(config: &DispatchConfig) -> Result<Box<dyn MotorTransport>> {
    let timeout = Duration::from_millis(config.timeout_ms);
    Ok(match &config.transport {
        TransportConfig::Mqtt(mqtt) => Box::new(mqtt::MqttTransport::connect(mqtt)),
        TransportConfig::Http(http) => Box::new(http::HttpTransport::new(http, timeout)?),
        TransportConfig::Log => Box::new(LogTransport),
    })
}
