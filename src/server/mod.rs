pub mod handlers;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tracing::info;

pub use handlers::ServerContext;

/// Build the overlay / dashboard / admin router
pub fn router(ctx: ServerContext) -> Router {
    Router::new()
        // Pages
        .route("/", get(handlers::dashboard))
        .route("/overlay", get(handlers::overlay))
        // Read-only snapshots polled by the overlay
        .route("/api/betting/current", get(handlers::current_betting))
        .route("/api/betting/history", get(handlers::betting_history))
        .route("/api/item/used", get(handlers::items_used))
        // Operator actions
        .route("/api/admin/betting/start", post(handlers::start_betting))
        .route("/api/admin/betting/close", post(handlers::close_betting))
        .route("/api/admin/betting/settle", post(handlers::settle_betting))
        .route("/api/admin/shop/items", post(handlers::add_item))
        .route(
            "/api/admin/shop/items/:id",
            put(handlers::update_item).delete(handlers::delete_item),
        )
        .route("/api/admin/event", post(handlers::set_multiplier))
        .route("/api/admin/users/:id/points", post(handlers::set_points))
        .route("/api/admin/users/:id", delete(handlers::delete_user))
        .route("/api/admin/points/reset", post(handlers::reset_points))
        .with_state(ctx)
}

/// Serve the router on localhost; the overlay is meant for an OBS browser
/// source on the same machine.
pub async fn run(ctx: ServerContext, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind overlay server on {addr}"))?;

    info!("Overlay server listening on http://{addr} (overlay at /overlay)");

    axum::serve(listener, app)
        .await
        .context("Overlay server exited")
}
