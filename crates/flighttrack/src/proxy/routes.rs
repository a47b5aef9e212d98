//! HTTP surface of the proxy: the axum router and server lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        Method,
    },
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::{FlightParams, FlightProxy, ProxyError};
use crate::error::Result;
use crate::flight::FlightStatusEnvelope;

/// Path of the flight-status endpoint.
pub const FLIGHT_ROUTE: &str = "/api/flight";

/// Build the proxy router.
pub fn router(proxy: Arc<FlightProxy>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, CACHE_CONTROL])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(FLIGHT_ROUTE, get(flight_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(proxy)
}

async fn flight_handler(
    State(proxy): State<Arc<FlightProxy>>,
    params: std::result::Result<Query<FlightParams>, QueryRejection>,
) -> std::result::Result<Json<FlightStatusEnvelope>, ProxyError> {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            // A missing key still wins over a malformed query string.
            proxy.access_key()?;
            return Err(ProxyError::validation(rejection.body_text()));
        }
    };

    proxy.lookup(params).await.map(Json)
}

/// Serve the proxy on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(listener: TcpListener, proxy: Arc<FlightProxy>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    info!("Proxy listening on http://{address}{FLIGHT_ROUTE}");

    axum::serve(listener, router(proxy))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Proxy shut down");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
