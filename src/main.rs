use anyhow::{Context, Result};
use std::sync::Arc;
use thingmap::config::{load_config, ThingmapConfig};
use thingmap::state::{LiveRegistry, RegistryChange, Selection};
use thingmap::view::{self, DetailCard};
use thingmap::{SyncService, ThingsClient};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thingmap=info".into()),
        )
        .init();

    info!("thingmap starting...");

    let mut config = match std::env::var("THINGMAP_CONFIG") {
        Ok(path) => load_config(&path).with_context(|| format!("Failed to load {}", path))?,
        Err(_) => ThingmapConfig::default(),
    };
    config.source.apply_env(|key| std::env::var(key).ok());
    info!(source = ?config.source, "Configuration loaded");

    // Optional thing to select once it shows up
    let focus = std::env::var("THINGMAP_SELECT").ok();

    let client = ThingsClient::new(&config.source).context("Failed to build HTTP client")?;
    let registry = Arc::new(LiveRegistry::new());
    let service = Arc::new(SyncService::new(client, Arc::clone(&registry)));

    let mut changes = registry.subscribe();
    let mut handle = service.start();

    if let Some(Err(e)) = handle.initial_fetch().await {
        error!(error = %e, "Initial fetch failed; continuing with push updates only");
    }

    let mut selection = Selection::new();
    loop {
        tokio::select! {
            result = changes.recv() => {
                match result {
                    Ok(change) => {
                        if let Some(id) = &focus {
                            if !selection.is_selected(id) && registry.contains(id) {
                                selection.select(Some(id.as_str()));
                            }
                        }
                        report(&registry, &mut selection, &change);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Change listener lagged, skipped updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    handle.shutdown();
    info!("thingmap stopped");

    Ok(())
}

fn report(registry: &LiveRegistry, selection: &mut Selection, change: &RegistryChange) {
    if selection.reconcile(registry) {
        info!("Selected thing was removed");
    }

    let markers = view::markers(registry, selection);
    let center = view::map_center(registry);
    info!(
        change = ?change,
        things = registry.len(),
        markers = markers.len(),
        center_lat = center.latitude,
        center_lon = center.longitude,
        "Map updated"
    );

    if let Some(thing) = selection.current(registry) {
        info!("\n{}", DetailCard::for_thing(&thing).render());
    }
}
