//! Reinforcement sweep: recent access folds back into salience.
//!
//! Items touched since the previous interval get a small boost; the heavy
//! lifting of explicit reinforcement lives in the engine's reinforce
//! operation.

use chrono::{Duration, Utc};
use tokio::sync::watch;

use openmemory_core::{OmConfig, OmResult};
use openmemory_storage::MemoryStore;

use super::cancelled;

const PAGE: usize = 500;
const SWEEP_BOOST: f64 = 0.05;

pub async fn run(
    store: &MemoryStore,
    cfg: &OmConfig,
    cancel: watch::Receiver<bool>,
) -> OmResult<serde_json::Value> {
    let window = Duration::minutes(cfg.decay_interval_minutes.max(1) as i64);
    let horizon = Utc::now() - window;
    let mut cursor: Option<String> = None;
    let mut boosted = 0usize;

    loop {
        if cancelled(&cancel) {
            break;
        }
        let page = store.scan_for_decay(cursor.as_deref(), PAGE).await?;
        let full = page.len() == PAGE;
        let last_id = page.last().map(|(id, _, _, _, _)| id.clone());

        for (id, user_id, salience, _rate, last_accessed) in page {
            if cancelled(&cancel) {
                break;
            }
            if last_accessed < horizon || salience >= 1.0 {
                continue;
            }
            store
                .apply_decay(&id, &user_id, (salience + SWEEP_BOOST).min(1.0), false)
                .await?;
            boosted += 1;
        }

        if !full {
            break;
        }
        cursor = last_id;
    }

    Ok(serde_json::json!({ "boosted": boosted }))
}
