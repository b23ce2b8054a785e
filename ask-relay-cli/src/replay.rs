//! `replay` command: feed recorded upstream batches through a session store

use anyhow::{Context, Result};
use ask_relay_core::bus::UpstreamBatch;
use ask_relay_core::config::Config;
use ask_relay_core::session::{MessagesSelector, SessionStore, StoreChange, StoreEvent};
use ask_relay_core::utils::truncate;
use console::style;
use std::path::Path;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};

/// Read batches from `path`, skipping blank lines and `#` comments
pub fn read_batches(path: &Path) -> Result<Vec<UpstreamBatch>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid upstream batch", path.display(), i + 1))
        })
        .collect()
}

pub async fn run(config: &Config, path: &Path, session: Option<String>) -> Result<()> {
    let batches = read_batches(path)?;
    info!(count = batches.len(), "Replaying upstream batches");

    let store = SessionStore::from_config(&config.store);
    let mut events = store.subscribe();
    let mut selector = session.map(MessagesSelector::new);

    for batch in batches {
        store.apply(batch).await;

        loop {
            match events.try_recv() {
                Ok(event) => println!("{}", describe_event(&store, &event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed store events");
                }
                Err(TryRecvError::Closed) => break,
            }
        }

        if let Some(selector) = selector.as_mut() {
            let selected = selector.select(&store.snapshot());
            let view = selected.view();
            println!(
                "  view {}: {} ({} messages, {})",
                selector.session_id(),
                if selected.is_changed() {
                    "changed"
                } else {
                    "unchanged"
                },
                view.messages.len(),
                loaded_label(view.is_loaded)
            );
        }
    }

    println!();
    println!("{}", style("Sessions").bold());
    for session in store.sessions() {
        let messages = store.messages(&session.id);
        let count = messages.as_ref().map_or(0, |m| m.len());
        let last = messages
            .as_ref()
            .and_then(|m| m.last())
            .map(|m| format!(" last: {}", truncate(&m.content, 40)))
            .unwrap_or_default();
        println!(
            "  {} seq={} title={} messages={} {}{}",
            style(&session.id).cyan(),
            session.seq,
            session.title.as_deref().unwrap_or("-"),
            count,
            loaded_label(store.is_loaded(&session.id)),
            last
        );
    }
    Ok(())
}

fn describe_event(store: &SessionStore, event: &StoreEvent) -> String {
    match &event.change {
        StoreChange::Sessions { ids } => format!("v{} sessions {}", event.version, ids.join(", ")),
        StoreChange::Messages { session_id } => {
            let count = store.messages(session_id).map_or(0, |m| m.len());
            format!(
                "v{} messages {} ({} messages, {})",
                event.version,
                session_id,
                count,
                loaded_label(store.is_loaded(session_id))
            )
        }
    }
}

fn loaded_label(is_loaded: bool) -> &'static str {
    if is_loaded {
        "loaded"
    } else {
        "loading"
    }
}
