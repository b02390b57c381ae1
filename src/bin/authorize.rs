use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chzzk_point_bot::api::auth;
use chzzk_point_bot::config;
use chzzk_point_bot::storage::JsonStore;

const REDIRECT_URI: &str = "https://localhost:8080";
const STATE_LEN: usize = 16;

/// OAuth code capture for the bot account.
///
/// Prints the account-interlock URL, waits for the operator to finish the
/// browser login and paste the redirect URL back, then exchanges the code
/// and stores the access token in settings.json.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authorize=info,chzzk_point_bot=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = JsonStore::new(config::data_dir())?;
    let mut settings = store.load_settings()?.unwrap_or_default();

    if settings.client_id.is_empty() || settings.client_secret.is_empty() {
        bail!("client_id and client_secret must be filled in settings.json first");
    }

    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect();

    let url = auth::authorize_url(&settings.client_id, REDIRECT_URI, &state);

    println!("Open this URL in a browser and log in:");
    println!();
    println!("  {url}");
    println!();
    println!("After the login the browser lands on a {REDIRECT_URI}/?code=... page.");
    print!("Paste that full URL here: ");
    io::stdout().flush()?;

    let mut redirect_url = String::new();
    io::stdin()
        .lock()
        .read_line(&mut redirect_url)
        .context("Failed to read the redirect URL")?;

    let (code, returned_state) = auth::extract_code(redirect_url.trim())?;
    if returned_state != state {
        bail!("Returned state does not match; do not reuse an old URL");
    }

    info!("Authorization code captured, exchanging for tokens");

    let tokens = auth::exchange_code(
        &reqwest::Client::new(),
        &settings.client_id,
        &settings.client_secret,
        &code,
        &returned_state,
    )
    .await?;

    settings.access_token = tokens.access_token;
    store.save_settings(&settings)?;

    info!("Access token saved to settings.json");
    println!();
    println!("Done. Keep the refresh token somewhere safe:");
    println!("  {}", tokens.refresh_token);

    Ok(())
}
