//! # openmemory-scheduler
//!
//! Background maintenance: decay, reinforcement sweep, reflection,
//! compaction, and key rotation. Each job runs as a cancellable task on a
//! tokio interval with a per-job singleton guard; start/stop events land in
//! the audit log so the dashboard can report active jobs.

pub mod jobs;
pub mod registry;
pub mod summarize;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use openmemory_core::models::AuditRecord;
use openmemory_core::ConfigHandle;
use openmemory_engine::MemoryEngine;
use openmemory_storage::MemoryStore;

use registry::JobRegistry;
use summarize::Summarizer;

pub struct Scheduler {
    store: Arc<MemoryStore>,
    engine: Arc<MemoryEngine>,
    config: ConfigHandle,
    registry: Arc<JobRegistry>,
    summarizer: Arc<dyn Summarizer>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<MemoryStore>,
        engine: Arc<MemoryEngine>,
        config: ConfigHandle,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            engine,
            config,
            registry: Arc::new(JobRegistry::new()),
            summarizer,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// Spawn every periodic job. Idempotent per scheduler instance only at
    /// startup; call once.
    pub fn start(&mut self) {
        let cfg = self.config.get();
        let decay_every = Duration::from_secs(cfg.decay_interval_minutes.max(1) * 60);

        self.spawn_job("decay", decay_every, {
            let store = self.store.clone();
            let config = self.config.clone();
            move |cancel| {
                let store = store.clone();
                let config = config.clone();
                async move { jobs::decay::run(&store, &config.get(), cancel).await }
            }
        });

        self.spawn_job("reinforce_sweep", decay_every, {
            let store = self.store.clone();
            let config = self.config.clone();
            move |cancel| {
                let store = store.clone();
                let config = config.clone();
                async move { jobs::reinforce_sweep::run(&store, &config.get(), cancel).await }
            }
        });

        if cfg.auto_reflect {
            self.spawn_job("reflection", decay_every, {
                let engine = self.engine.clone();
                let config = self.config.clone();
                let summarizer = self.summarizer.clone();
                move |cancel| {
                    let engine = engine.clone();
                    let config = config.clone();
                    let summarizer = summarizer.clone();
                    async move {
                        jobs::reflection::run(&engine, &config.get(), summarizer.as_ref(), cancel)
                            .await
                    }
                }
            });
        }

        self.spawn_job("compaction", decay_every, {
            let store = self.store.clone();
            let config = self.config.clone();
            move |cancel| {
                let store = store.clone();
                let config = config.clone();
                async move { jobs::compaction::run(&store, &config.get(), cancel).await }
            }
        });

        self.spawn_job("key_rotation", decay_every, {
            let store = self.store.clone();
            move |cancel| {
                let store = store.clone();
                async move { jobs::rotation::run(&store, cancel).await }
            }
        });
    }

    fn spawn_job<F, Fut>(&mut self, name: &'static str, every: Duration, mut job: F)
    where
        F: FnMut(watch::Receiver<bool>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = openmemory_core::OmResult<serde_json::Value>> + Send,
    {
        let registry = self.registry.clone();
        let store = self.store.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup stays
            // quiet.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }

                let Some(running) = registry.try_start(name) else {
                    tracing::warn!(job = name, "previous run still active, skipping tick");
                    continue;
                };

                let started = AuditRecord::new("job.start", "job").on_resource(name);
                if let Err(e) = store.insert_audit(&started).await {
                    tracing::warn!(job = name, error = %e, "failed to audit job start");
                }

                let outcome = job(shutdown.clone()).await;
                let stopped = match &outcome {
                    Ok(summary) => AuditRecord::new("job.stop", "job")
                        .on_resource(name)
                        .with_metadata(summary.clone()),
                    Err(e) => AuditRecord::new("job.error", "job")
                        .on_resource(name)
                        .with_metadata(serde_json::json!({ "error": e.to_string() })),
                };
                if let Err(e) = store.insert_audit(&stopped).await {
                    tracing::warn!(job = name, error = %e, "failed to audit job stop");
                }
                if let Err(e) = outcome {
                    // Errors are recorded and the job retries next tick.
                    tracing::warn!(job = name, error = %e, "maintenance job failed");
                }
                drop(running);
            }
        });
        self.handles.push(handle);
    }

    /// Signal every job and wait for them to reach a safe checkpoint,
    /// bounded by the deadline.
    pub async fn shutdown(&mut self, deadline: Duration) {
        let _ = self.shutdown_tx.send(true);
        let drain = async {
            for handle in self.handles.drain(..) {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(deadline, drain).await.is_err() {
            tracing::warn!("scheduler shutdown deadline expired, proceeding");
        }
    }
}
