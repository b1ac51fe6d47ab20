//! Salience decay.
//!
//! `salience = max(0, salience * (1 - rate * dt_days))`, where the
//! per-item rate is scaled by the configured decay ratio. Items falling
//! below the archival floor are flagged, never deleted.

use chrono::Utc;
use tokio::sync::watch;

use openmemory_core::{OmConfig, OmResult};
use openmemory_storage::MemoryStore;

use super::cancelled;

const PAGE: usize = 500;

/// Per-run multiplicative fade on waypoint weights.
const WAYPOINT_DECAY_FACTOR: f64 = 0.98;

pub async fn run(
    store: &MemoryStore,
    cfg: &OmConfig,
    cancel: watch::Receiver<bool>,
) -> OmResult<serde_json::Value> {
    let now = Utc::now();
    let mut cursor: Option<String> = None;
    let mut decayed = 0usize;
    let mut archived = 0usize;

    loop {
        if cancelled(&cancel) {
            break;
        }
        let page = store.scan_for_decay(cursor.as_deref(), PAGE).await?;
        let full = page.len() == PAGE;
        let last_id = page.last().map(|(id, _, _, _, _)| id.clone());

        for (id, user_id, salience, decay_rate, last_accessed) in page {
            if cancelled(&cancel) {
                break;
            }
            let dt_days = ((now - last_accessed).num_seconds().max(0) as f64) / 86_400.0;
            let effective_rate = decay_rate * cfg.decay_ratio;
            let next = (salience * (1.0 - effective_rate * dt_days)).max(0.0);
            if (next - salience).abs() < 1e-9 {
                continue;
            }
            let should_archive = next < cfg.archival_floor;
            store.apply_decay(&id, &user_id, next, should_archive).await?;
            decayed += 1;
            if should_archive {
                archived += 1;
            }
        }

        if !full {
            break;
        }
        cursor = last_id;
    }

    // Associative strength fades alongside item salience.
    let mut offset = 0;
    loop {
        if cancelled(&cancel) {
            break;
        }
        let users = store.list_users(200, offset).await?;
        let page_len = users.len();
        for user in users {
            store
                .decay_waypoints(WAYPOINT_DECAY_FACTOR, &user.user_id)
                .await?;
        }
        if page_len < 200 {
            break;
        }
        offset += page_len;
    }

    Ok(serde_json::json!({ "decayed": decayed, "archived": archived }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn decay_lowers_salience_and_archives_below_floor() {
        let registry = Arc::new(openmemory_crypto::KeyRegistry::new(1, [1u8; 32]));
        let cipher = Arc::new(openmemory_crypto::ContentCipher::new(registry));
        let store = MemoryStore::open_in_memory(false, cipher).await.unwrap();

        let mut item = openmemory_core::models::MemoryItem::new(
            "u1",
            "fading memory",
            openmemory_core::Sector::Semantic,
        );
        item.salience = 0.06;
        item.decay_rate = 1.0;
        item.last_accessed_at = Utc::now() - chrono::Duration::days(30);
        store.insert_memory(&item).await.unwrap();

        let cfg = openmemory_core::OmConfig::from_env().unwrap();
        let (_tx, rx) = watch::channel(false);
        let summary = run(&store, &cfg, rx).await.unwrap();

        assert_eq!(summary["decayed"], 1);
        assert_eq!(summary["archived"], 1);
        let got = store.get_memory(&item.id, "u1").await.unwrap().unwrap();
        assert!(got.archived);
        assert!(got.salience < 0.06);
    }
}
