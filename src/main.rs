use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chzzk_point_bot::api::{ChatFeed, ChzzkClient};
use chzzk_point_bot::config;
use chzzk_point_bot::engine::BotState;
use chzzk_point_bot::server::{self, ServerContext};
use chzzk_point_bot::storage::{persist_dirty, Dirty, JsonStore};
use chzzk_point_bot::workers::{ChatSender, ChatWorker, RoundTimer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chzzk_point_bot=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting chzzk-point-bot");

    // Load settings and persisted state
    let store = Arc::new(JsonStore::new(config::data_dir())?);
    let settings = match store.load_settings()? {
        Some(settings) => settings,
        None => {
            warn!("No settings.json found, starting with defaults");
            Default::default()
        }
    };

    if settings.channel_id.is_empty() || settings.access_token.is_empty() {
        warn!("channel_id or access_token missing; run the authorize tool and fill settings.json");
    }

    let state = BotState::new(
        settings.clone(),
        store.load_users()?,
        store.load_shop_items()?,
        store.load_inventories()?,
        store.load_history()?,
    );
    info!(
        "State loaded: {} users, {} shop items, {} settled rounds",
        state.ledger.user_count(),
        state.shop.items().len(),
        state.betting.history().len()
    );
    let state = Arc::new(RwLock::new(state));

    // Channel plumbing: feed -> chat worker, everyone -> sender
    let (event_tx, event_rx) = mpsc::channel(256);
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

    let client = ChzzkClient::new(&settings);

    // Create workers
    let feed = ChatFeed::new(client.clone(), event_tx);
    let chat_worker = ChatWorker::new(
        Arc::clone(&state),
        Arc::clone(&store),
        outbox_tx.clone(),
        event_rx,
    );
    let sender = ChatSender::new(client, settings.channel_id.clone(), outbox_rx);
    let round_timer = RoundTimer::new(Arc::clone(&state), outbox_tx.clone());

    let server_ctx = ServerContext {
        state: Arc::clone(&state),
        store: Arc::clone(&store),
        outbox: outbox_tx,
    };
    let server_port = settings.server_port;

    info!("Workers created, starting...");

    // Spawn workers
    let feed_handle = tokio::spawn(async move {
        feed.run().await;
    });

    let worker_handle = tokio::spawn(async move {
        chat_worker.run().await;
    });

    let sender_handle = tokio::spawn(async move {
        sender.run().await;
    });

    let timer_handle = tokio::spawn(async move {
        round_timer.run().await;
    });

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::run(server_ctx, server_port).await {
            error!("Overlay server failed: {e}");
        }
    });

    info!("All workers started");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = feed_handle => {
            error!("Chat feed exited unexpectedly: {:?}", result);
        }
        result = worker_handle => {
            error!("Chat worker exited unexpectedly: {:?}", result);
        }
        result = sender_handle => {
            error!("Chat sender exited unexpectedly: {:?}", result);
        }
        result = timer_handle => {
            error!("Round timer exited unexpectedly: {:?}", result);
        }
        result = server_handle => {
            error!("Overlay server exited unexpectedly: {:?}", result);
        }
    }

    // Final best-effort persist of everything
    {
        let state = state.read().await;
        let all = Dirty {
            settings: true,
            users: true,
            shop: true,
            inventory: true,
            history: true,
        };
        if let Err(e) = persist_dirty(&store, &state, all) {
            error!("Final persist failed: {e}");
        }
    }

    info!("Shutting down chzzk-point-bot");
    Ok(())
}
