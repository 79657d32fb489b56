//! Health prober
//!
//! Sends a single `HEAD` request over a fresh TCP connection and classifies
//! the status line. Transport failures never escape: they are logged and
//! reported as unhealthy. Retrying is the caller's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::RolloutError;

/// Status codes treated as healthy
const HEALTHY_STATUSES: [u16; 4] = [200, 301, 302, 304];

/// A boolean gate consulted around reloads
#[async_trait]
pub trait HealthGate: Send + Sync {
    async fn check(&self) -> bool;
}

/// Target of a health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbe {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout: Duration,
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 80,
            path: "/".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl HealthProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Probes once, returning whether the server answered healthy
    pub async fn probe(&self) -> bool {
        match self.fetch().await {
            Ok(response) => {
                let healthy = is_healthy_response(&response);
                if !healthy {
                    warn!(
                        "Health check against {} returned '{}'",
                        self.address(),
                        status_line(&response)
                    );
                }
                healthy
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Performs the request and returns the raw response text
    async fn fetch(&self) -> Result<String, RolloutError> {
        let address = self.address();
        let transport = |detail: String| RolloutError::Transport {
            address: address.clone(),
            detail,
        };

        let request = format!(
            "HEAD {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path, self.host
        );

        let exchange = async {
            let mut stream = TcpStream::connect(&address).await?;
            stream.write_all(request.as_bytes()).await?;
            let mut response = Vec::new();
            stream.read_to_end(&mut response).await?;
            Ok::<_, std::io::Error>(response)
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| transport(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| transport(e.to_string()))?;

        debug!("Health check against {} read {} bytes", address, response.len());
        Ok(String::from_utf8_lossy(&response).to_string())
    }
}

#[async_trait]
impl HealthGate for HealthProbe {
    async fn check(&self) -> bool {
        self.probe().await
    }
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or("").trim()
}

/// Parses the status code from an HTTP status line
///
/// Only the first line is inspected, so digits in headers or bodies cannot
/// be mistaken for a status.
pub fn parse_status_code(response: &str) -> Option<u16> {
    let mut parts = status_line(response).split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

/// True if the response's status is one of 200, 301, 302 or 304
pub fn is_healthy_response(response: &str) -> bool {
    parse_status_code(response).is_some_and(|code| HEALTHY_STATUSES.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serves one canned response on an ephemeral port
    async fn serve_once(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        port
    }

    #[test]
    fn test_parse_status_code() {
        assert_eq!(parse_status_code("HTTP/1.1 200 OK\r\n"), Some(200));
        assert_eq!(parse_status_code("HTTP/1.0 304 Not Modified\r\n"), Some(304));
        assert_eq!(parse_status_code("HTTP/2 301\r\n"), Some(301));
        assert_eq!(parse_status_code("garbage"), None);
        assert_eq!(parse_status_code(""), None);
    }

    #[test]
    fn test_healthy_statuses() {
        assert!(is_healthy_response("HTTP/1.1 200 OK\r\n"));
        assert!(is_healthy_response("HTTP/1.1 302 Found\r\n"));
        assert!(!is_healthy_response("HTTP/1.1 404 Not Found\r\n"));
        assert!(!is_healthy_response("HTTP/1.1 204 No Content\r\n"));
    }

    #[test]
    fn test_header_digits_do_not_count_as_status() {
        let response = "HTTP/1.1 503 Service Unavailable\r\nX-Request-Id: 301302304\r\nContent-Length: 200\r\n\r\n";

        assert!(!is_healthy_response(response));
    }

    #[tokio::test]
    async fn test_probe_ok_response() {
        let port = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;

        let probe = HealthProbe::new("127.0.0.1", port);

        assert!(probe.probe().await);
    }

    #[tokio::test]
    async fn test_probe_redirect_is_healthy() {
        let port = serve_once("HTTP/1.1 302 Found\r\nLocation: /login\r\n\r\n").await;

        assert!(HealthProbe::new("127.0.0.1", port).check().await);
    }

    #[tokio::test]
    async fn test_probe_server_error_is_unhealthy() {
        let port = serve_once("HTTP/1.1 500 Internal Server Error\r\n\r\n").await;

        assert!(!HealthProbe::new("127.0.0.1", port).probe().await);
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(!HealthProbe::new("127.0.0.1", port).probe().await);
    }

    #[tokio::test]
    async fn test_probe_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let holder = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let probe =
            HealthProbe::new("127.0.0.1", port).with_timeout(Duration::from_millis(200));

        assert!(!probe.probe().await);
        holder.abort();
    }

    #[tokio::test]
    async fn test_probe_sends_head_with_connection_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let probe = HealthProbe::new("127.0.0.1", port).with_path("/server-status");
        assert!(probe.probe().await);

        let request = server.await.unwrap();
        assert!(request.starts_with("HEAD /server-status HTTP/1.1\r\n"));
        assert!(request.contains("Connection: close\r\n"));
    }
}
