// External crates
use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    body::Incoming,
    header::{CONTENT_TYPE, HeaderValue},
    http::{Method, Request, Response, StatusCode},
    service::service_fn,
};
use hyper_util::{rt::TokioExecutor, server::conn::auto::Builder as HyperServerBuilder};
use prometheus::{Encoder, TextEncoder};
use std::{convert::Infallible, net::SocketAddr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Encode every registered metric in the Prometheus text format.
pub fn encode_metrics() -> (String, Vec<u8>) {
    let metrics_families = prometheus::gather();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metrics_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode prometheus metrics");
    }

    (encoder.format_type().to_string(), buffer)
}

#[instrument(name = "estail_metrics::handler", level = "debug", skip_all)]
async fn metrics_handler(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let (content_type, buffer) = encode_metrics();
            tracing::debug!(
                writer_buffer = buffer.len(),
                "Encoded collected metrics into prometheus text format"
            );

            let mut response = Response::new(Full::new(Bytes::from(buffer)));
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            Ok(response)
        }
        _ => {
            let mut response = Response::new(Full::new(Bytes::from_static(b"Not Found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

/// Bind the metrics listener. Binding happens up front so a bad address is a
/// startup error rather than a background one.
pub async fn bind_metrics_listener(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint on {addr}"))
}

/// Serve `/metrics` until `cancel` fires.
#[instrument(name = "estail_metrics::serve", level = "debug", skip_all)]
pub async fn serve_metrics(listener: TcpListener, cancel: CancellationToken) {
    if let Ok(addr) = listener.local_addr() {
        tracing::debug!(
            metrics_endpoint = %addr,
            "estail metrics available at http://{addr}/metrics"
        );
    }

    loop {
        let (stream, _) = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Metrics server stopping");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept metrics connection");
                    continue;
                }
            },
        };

        let io = hyper_util::rt::TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = HyperServerBuilder::new(TokioExecutor::new())
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::warn!(
                    error = %err,
                    "Metrics server connection error"
                );
            }
        });
    }
}
