//! Key rotation: rewrite ciphertext in batches onto the current key
//! version, recording per-batch progress.

use tokio::sync::watch;

use openmemory_core::models::AuditRecord;
use openmemory_core::OmResult;
use openmemory_storage::MemoryStore;

use super::cancelled;

const BATCH: usize = 200;

pub async fn run(
    store: &MemoryStore,
    cancel: watch::Receiver<bool>,
) -> OmResult<serde_json::Value> {
    let mut cursor: Option<String> = None;
    let mut total = 0usize;
    let mut batches = 0usize;

    loop {
        if cancelled(&cancel) {
            break;
        }
        let (rewritten, next) = store.rotate_key_batch(cursor.as_deref(), BATCH).await?;
        if rewritten == 0 && next.is_none() {
            break;
        }
        total += rewritten;
        batches += 1;

        let progress = AuditRecord::new("job.key_rotation.batch", "job")
            .with_metadata(serde_json::json!({
                "batch": batches,
                "rewritten": rewritten,
                "total": total,
            }));
        store.insert_audit(&progress).await?;

        match next {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }

    Ok(serde_json::json!({ "rewritten": total, "batches": batches }))
}
