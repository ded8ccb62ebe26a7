//! The HTTP server loop.

use crate::http::HttpDelegate;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use observability_deps::tracing::info;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

/// Binds `addr` and serves `delegate` until the process ends or the
/// listener fails.
pub async fn serve(addr: SocketAddr, delegate: Arc<HttpDelegate>) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_conn| {
        let delegate = Arc::clone(&delegate);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let delegate = Arc::clone(&delegate);
                async move { Ok::<_, Infallible>(delegate.route(req).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "HTTP server listening");
    server.await
}
