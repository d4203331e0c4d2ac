//! srs-client — headless SRS client.
//!
//! Joins a coordination server as a listen-only participant and logs the
//! roster. Usage: `srs-client [host:port]`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use srs_core::config::ClientConfig;
use srs_session::{event_channel, spawn_callback_thread, ConnectionPhase};

use srs_client::headless::{empty_radio, ConfiguredLocal, HeadlessRadio, Inert, LoggingCallbacks};
use srs_client::{ClientOptions, Collaborators, SyncClient};

const ROSTER_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = ClientConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = ClientConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ClientConfig::default()
    });

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.network.server.clone());
    let options = ClientOptions::from_config(&config).context("invalid minimum protocol version")?;
    let guid = config.identity.resolve_guid();
    tracing::info!(%address, client_guid = %guid, "srs-client starting");

    let radio = Arc::new(HeadlessRadio::new());
    let local = Arc::new(ConfiguredLocal::from_config(&config));
    local.update(|s| s.radio = Some(empty_radio("External AWACS")));

    let (events, receiver) = event_channel();
    let callbacks = spawn_callback_thread(receiver, LoggingCallbacks)
        .context("failed to start callback thread")?;

    let client = SyncClient::new(
        guid,
        options,
        Collaborators {
            radio,
            auxiliary: Arc::new(Inert("line-of-sight")),
            integration: Arc::new(Inert("controller-integration")),
            local,
        },
        events,
    );
    let mut connection = client.try_connect(address)?;

    if let Ok(password) = std::env::var("SRS_EXTERNAL_MODE_PASSWORD") {
        let client = client.clone();
        tokio::spawn(async move {
            while client.phase() == ConnectionPhase::Connecting {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            if let Err(e) = client.connect_external_mode(&password).await {
                tracing::warn!(error = %e, "could not request external mode");
            }
        });
    }

    let roster = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ROSTER_LOG_INTERVAL);
            loop {
                interval.tick().await;
                for peer in client.registry().snapshot() {
                    tracing::info!(
                        peer = %peer.client_guid,
                        name = %peer.name,
                        coalition = peer.coalition,
                        radios = peer.radio.as_ref().map(|r| r.radios.len()).unwrap_or(0),
                        "peer"
                    );
                }
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            client.disconnect().await;
            let _ = (&mut connection).await;
        }
        _ = &mut connection => tracing::info!("connection ended"),
    }
    roster.abort();

    // Dropping the last sink ends the callback thread.
    drop(client);
    tokio::task::spawn_blocking(move || callbacks.join())
        .await
        .context("callback thread join task failed")?
        .map_err(|_| anyhow::anyhow!("callback thread panicked"))?;

    Ok(())
}
