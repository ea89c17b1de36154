//! HTTP endpoint for the Prometheus registry.
//!
//! The rest of the agent is synchronous; the server runs on its own thread
//! with a single-threaded tokio runtime and stops when the returned
//! [`MetricsServer`] is shut down or dropped.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::metrics::AgentMetrics;

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Errors from metric registration and the HTTP endpoint.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("metric registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("metrics server I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Build the router serving `/metrics` and `/healthz`.
pub fn router(metrics: Arc<AgentMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(healthz))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<AgentMetrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Handle to a running metrics server.
#[derive(Debug)]
pub struct MetricsServer {
    local_addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MetricsServer {
    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the server thread.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("metrics server thread panicked");
            }
        }
    }
}

impl Drop for MetricsServer {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Bind `addr` and serve `metrics` on a background thread.
///
/// Binding happens before this returns, so an unusable address is reported
/// to the caller rather than logged from the server thread.
pub fn serve_metrics(
    metrics: Arc<AgentMetrics>,
    addr: SocketAddr,
) -> Result<MetricsServer, ExporterError> {
    let listener = TcpListener::bind(addr).map_err(|source| ExporterError::Bind { addr, source })?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (stop, stopped) = oneshot::channel::<()>();
    let app = router(metrics);

    let thread = std::thread::Builder::new()
        .name("metrics-http".to_string())
        .spawn(move || {
            let served = runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener)?;
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = stopped.await;
                    })
                    .await
            });
            match served {
                Ok(()) => debug!("metrics server stopped"),
                Err(e) => warn!(error = %e, "metrics server failed"),
            }
        })?;

    info!(address = %local_addr, "serving metrics");
    Ok(MetricsServer {
        local_addr,
        stop: Some(stop),
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_metrics;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    fn metrics() -> Arc<AgentMetrics> {
        let defs = parse_metrics(
            "- name: ifHCInOctets\n  description: Ingress octets.\n  oidStub: .1.3.6.1.2.1.31.1.1.1.6\n  mlabUplinkName: u\n  mlabMachineName: m\n",
        )
        .expect("definitions");
        Arc::new(AgentMetrics::new("mlab2.example.org", &defs).expect("metrics"))
    }

    fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        write!(
            stream,
            "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        )
        .expect("write request");
        let mut response = String::new();
        stream.read_to_string(&mut response).expect("read response");
        response
    }

    #[test]
    fn test_serves_metrics() {
        let metrics = metrics();
        metrics.add_delta("ifHCInOctets", "xe-0/0/12", 45);
        let server = serve_metrics(metrics, "127.0.0.1:0".parse().expect("addr")).expect("serve");

        let response = http_get(server.local_addr(), "/metrics");
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/plain; version=0.0.4"));
        assert!(response.contains("ifHCInOctets{interface=\"xe-0/0/12\",node=\"mlab2.example.org\"} 45"));

        server.shutdown();
    }

    #[test]
    fn test_healthz_and_unknown_path() {
        let server = serve_metrics(metrics(), "127.0.0.1:0".parse().expect("addr")).expect("serve");

        assert!(http_get(server.local_addr(), "/healthz").ends_with("ok"));
        assert!(http_get(server.local_addr(), "/nope").starts_with("HTTP/1.1 404"));
    }

    #[test]
    fn test_bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = taken.local_addr().expect("addr");

        match serve_metrics(metrics(), addr) {
            Err(ExporterError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[test]
    fn test_shutdown_releases_port() {
        let server = serve_metrics(metrics(), "127.0.0.1:0".parse().expect("addr")).expect("serve");
        let addr = server.local_addr();
        server.shutdown();

        assert!(TcpListener::bind(addr).is_ok());
    }
}
