// src/dispatch/http.rs
//
// GET <url>?RightSpeed=<r>&LeftSpeed=<l>, success = 200 OK.

use super::transport::{MotorTransport, TransportError};
use crate::types::{HttpConfig, MotorCommand};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

pub struct HttpTransport {
    http_client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        info!("📡 HTTP motor endpoint: {}", config.url);
        Ok(Self {
            http_client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl MotorTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&mut self, command: MotorCommand) -> Result<(), TransportError> {
        let response = self
            .http_client
            .get(&self.url)
            .query(&[
                ("RightSpeed", command.right_speed),
                ("LeftSpeed", command.left_speed),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status(status.as_u16()));
        }

        debug!(
            "Data sent: RightSpeed = {}, LeftSpeed = {}",
            command.right_speed, command.left_speed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, reply with `status_line`, return the request head.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut head = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nOK",
                status_line
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&head).to_string()
        });

        (format!("http://{}/setSpeed", addr), handle)
    }

    fn transport(url: String) -> HttpTransport {
        HttpTransport::new(&HttpConfig { url }, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_sends_both_speeds_as_query() {
        let (url, server) = one_shot_server("200 OK").await;
        let mut t = transport(url);

        let result = t
            .send(MotorCommand {
                left_speed: 32,
                right_speed: 28,
            })
            .await;
        assert!(result.is_ok(), "{:?}", result);

        let head = server.await.unwrap();
        let request_line = head.lines().next().unwrap();
        assert!(request_line.starts_with("GET /setSpeed?"), "{}", request_line);
        assert!(request_line.contains("RightSpeed=28"));
        assert!(request_line.contains("LeftSpeed=32"));
    }

    #[tokio::test]
    async fn test_non_ok_status_is_error() {
        let (url, server) = one_shot_server("500 Internal Server Error").await;
        let mut t = transport(url);

        let err = t
            .send(MotorCommand {
                left_speed: 30,
                right_speed: 30,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status(500)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut t = transport(format!("http://{}/setSpeed", addr));
        let err = t
            .send(MotorCommand {
                left_speed: 30,
                right_speed: 30,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }
}
