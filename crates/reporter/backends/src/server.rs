//! HTTP endpoint serving a [`Registry`] to prometheus scrapers.

use crate::{BackendError, render};
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode,
    body::{Bytes, Incoming},
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use prometheus::{Registry, TEXT_FORMAT};
use std::{convert::Infallible, fmt, net::SocketAddr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Serves `GET /metrics` from a [`Registry`] until cancelled.
pub struct ScrapeServer {
    listener: TcpListener,
    registry: Registry,
}

impl fmt::Debug for ScrapeServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeServer").field("listener", &self.listener).finish_non_exhaustive()
    }
}

impl ScrapeServer {
    /// Path scrapes are answered on.
    pub const PATH: &'static str = "/metrics";

    /// Binds the endpoint to `addr`.
    pub async fn bind(addr: SocketAddr, registry: Registry) -> Result<Self, BackendError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BackendError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts scrapes until `cancel_token` fires.
    pub async fn serve(self, cancel_token: CancellationToken) -> Result<(), BackendError> {
        let addr = self.local_addr()?;
        info!(target: "tally::prometheus", %addr, path = Self::PATH, "Serving scrapes");

        loop {
            let stream = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        warn!(target: "tally::prometheus", %err, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let registry = self.registry.clone();
            tokio::spawn(async move {
                let service = service_fn(move |request| scrape(registry.clone(), request));
                if let Err(err) =
                    http1::Builder::new().serve_connection(TokioIo::new(stream), service).await
                {
                    debug!(target: "tally::prometheus", %err, "Scrape connection closed");
                }
            });
        }

        info!(target: "tally::prometheus", %addr, "Scrape endpoint stopped");
        Ok(())
    }
}

async fn scrape(
    registry: Registry,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if request.method() != Method::GET || request.uri().path() != ScrapeServer::PATH {
        return Ok(respond(StatusCode::NOT_FOUND, "text/plain", String::new()));
    }

    Ok(match render(&registry) {
        Ok(body) => respond(StatusCode::OK, TEXT_FORMAT, body),
        Err(err) => {
            warn!(target: "tally::prometheus", %err, "Failed to render scrape");
            respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", err.to_string())
        }
    })
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
