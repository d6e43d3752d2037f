//! HTTP server: listener loop and route dispatch.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::ORIGIN;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::admin::{self, rules};
use crate::rewrite::{cors, handle_rewrite, RewriteContext};

pub struct Server {
    listener: TcpListener,
    ctx: Arc<RewriteContext>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    now: String,
}

impl Server {
    pub async fn bind(addr: SocketAddr, ctx: Arc<RewriteContext>) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        info!(
            "mimic proxy listening on http://{}",
            self.listener.local_addr()?
        );

        loop {
            let (stream, _) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let ctx = Arc::clone(&self.ctx);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let ctx = Arc::clone(&ctx);
                    async move { Ok::<_, std::convert::Infallible>(route(req, ctx).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("connection error: {}", e);
                }
            });
        }
    }
}

async fn route(req: Request<Incoming>, ctx: Arc<RewriteContext>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    if method == Method::OPTIONS && path.starts_with("/api/") {
        let origin = req
            .headers()
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        return cors::preflight(origin.as_deref());
    }

    match (&method, path.as_str()) {
        (&Method::GET | &Method::POST, "/api/rewrite") => handle_rewrite(req, ctx).await,
        (&Method::GET, "/api/rules") => {
            rules::handle_get(req.uri().query(), &ctx.store)
        }
        (&Method::PUT, "/api/rules") => rules::handle_put(req, &ctx.store).await,
        (&Method::GET, "/health") => admin::json_response(
            StatusCode::OK,
            &Health {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
                now: chrono::Utc::now().to_rfc3339(),
            },
        ),
        _ => admin::not_found(),
    }
}
