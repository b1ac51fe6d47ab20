//! Reflection: summarize a user's recent memories into a reflective item.
//!
//! Fires once a user's memory count clears `reflect_min * (reflections +
//! 1)`, so each reflection waits for a fresh batch of material.

use tokio::sync::watch;

use openmemory_core::{OmConfig, OmResult, Sector};
use openmemory_engine::{AddRequest, MemoryEngine};

use crate::summarize::Summarizer;

use super::cancelled;

pub async fn run(
    engine: &MemoryEngine,
    cfg: &OmConfig,
    summarizer: &dyn Summarizer,
    cancel: watch::Receiver<bool>,
) -> OmResult<serde_json::Value> {
    let store = engine.store();
    let mut reflected = 0usize;
    let mut offset = 0;

    loop {
        if cancelled(&cancel) {
            break;
        }
        let users = store.list_users(100, offset).await?;
        let page_len = users.len();

        for user in users {
            if cancelled(&cancel) {
                break;
            }
            let total = store.count_memories_by_user(&user.user_id).await? as usize;
            let due = cfg.reflect_min * (user.reflection_count as usize + 1);
            if cfg.reflect_min == 0 || total < due {
                continue;
            }

            let recent = store
                .list_recent_memories(&user.user_id, cfg.reflect_min)
                .await?;
            let summary = summarizer.summarize(&recent);
            if summary.is_empty() {
                continue;
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert("source".into(), serde_json::Value::String("reflection".into()));
            let added = engine
                .add(AddRequest {
                    user_id: user.user_id.clone(),
                    content: summary.clone(),
                    tags: vec!["reflection".into()],
                    metadata,
                    sector_hint: Some(Sector::Reflective),
                })
                .await?;
            if !added.deduplicated {
                store.set_user_summary(&user.user_id, &summary).await?;
                reflected += 1;
            }
        }

        if page_len < 100 {
            break;
        }
        offset += page_len;
    }

    Ok(serde_json::json!({ "reflected": reflected }))
}
