//! Compaction: dangling waypoints, duplicate facts, stale rate windows,
//! backup retention.

use tokio::sync::watch;

use openmemory_core::{OmConfig, OmResult};
use openmemory_storage::MemoryStore;

use super::cancelled;

pub async fn run(
    store: &MemoryStore,
    cfg: &OmConfig,
    cancel: watch::Receiver<bool>,
) -> OmResult<serde_json::Value> {
    let dangling = store.delete_dangling_waypoints().await?;
    if cancelled(&cancel) {
        return Ok(serde_json::json!({ "dangling_waypoints": dangling }));
    }

    let merged = store.merge_duplicate_facts().await?;
    if cancelled(&cancel) {
        return Ok(serde_json::json!({
            "dangling_waypoints": dangling,
            "merged_facts": merged,
        }));
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let horizon = now_ms - 2 * cfg.rate_limit_window_ms as i64;
    let pruned_windows = store.prune_rate_windows(horizon).await?;

    let pruned_backups = match store.prune_backups(&cfg.backup_dir, cfg.backup_retention) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "backup retention pass failed");
            0
        }
    };

    Ok(serde_json::json!({
        "dangling_waypoints": dangling,
        "merged_facts": merged,
        "pruned_rate_windows": pruned_windows,
        "pruned_backups": pruned_backups,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn compaction_removes_dangling_waypoints() {
        let registry = Arc::new(openmemory_crypto::KeyRegistry::new(1, [2u8; 32]));
        let cipher = Arc::new(openmemory_crypto::ContentCipher::new(registry));
        let store = MemoryStore::open_in_memory(false, cipher).await.unwrap();

        let item = openmemory_core::models::MemoryItem::new(
            "u1",
            "anchor",
            openmemory_core::Sector::Semantic,
        );
        store.insert_memory(&item).await.unwrap();
        // One live edge, one edge whose endpoint never existed.
        store
            .upsert_waypoint(&openmemory_core::models::Waypoint::new(
                &item.id, &item.id, "u1", 0.4,
            ))
            .await
            .unwrap();
        store
            .upsert_waypoint(&openmemory_core::models::Waypoint::new(
                &item.id, "ghost", "u1", 0.4,
            ))
            .await
            .unwrap();

        let cfg = openmemory_core::OmConfig::from_env().unwrap();
        let (_tx, rx) = watch::channel(false);
        let summary = run(&store, &cfg, rx).await.unwrap();
        assert_eq!(summary["dangling_waypoints"], 1);
    }
}
