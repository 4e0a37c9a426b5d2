//! Axum server bootstrap: wires tracing and permissive CORS around the
//! router, then binds and serves.

use crate::state::AppState;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = crate::routes::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "manuscript-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
