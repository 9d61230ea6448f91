//! Engine implementation

use crate::config::EngineConfig;
use crate::error::EngineResult;
use parking_lot::Mutex;
use rowcc_metrics::{Metrics, MetricsSnapshot};
use rowcc_primitives::{RowId, Value};
use rowcc_scheduler::{
    CancellationToken, EventSink, ExecutionContext, ExecutionLog,
    LockManager, PartitionMap, RunReport, SerializabilityVerifier, Strategy, TracingSink, Verdict,
};
use rowcc_storage::{RowReader, RowStore};
use rowcc_types::{Batch, Operation};
use std::sync::Arc;

/// Row-addressed in-memory engine.
///
/// Runs are serialized: a second `run` call waits for the first to finish.
/// The execution log accumulates across runs until [`Engine::reset_log`].
pub struct Engine {
    config: EngineConfig,
    store: RowStore,
    locks: LockManager,
    log: ExecutionLog,
    verifier: SerializabilityVerifier,
    metrics: Arc<Metrics>,
    events: Arc<dyn EventSink>,
    run_lock: Mutex<()>,
}

impl Engine {
    /// Create an engine with `row_count` rows, row `i` holding `i`
    pub fn new(row_count: usize) -> Self {
        Self::build(EngineConfig::with_rows(row_count))
    }

    /// Create an engine from a validated configuration
    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let metrics = Arc::new(Metrics::new());
        let locks = LockManager::new(config.row_count)
            .with_poll_interval(config.poll_interval())
            .with_metrics(metrics.clone());
        tracing::debug!(rows = config.row_count, strategy = %config.strategy, "engine created");
        Self {
            store: RowStore::new(config.row_count),
            locks,
            log: ExecutionLog::new(),
            verifier: SerializabilityVerifier::new().with_metrics(metrics.clone()),
            metrics,
            events: Arc::new(TracingSink),
            run_lock: Mutex::new(()),
            config,
        }
    }

    /// Send worker events to `events` instead of `tracing`
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Run `batch` under `strategy`, blocking until every worker is done
    pub fn run(&self, batch: Batch, strategy: Strategy) -> EngineResult<RunReport> {
        self.run_with_cancel(batch, strategy, &CancellationToken::new())
    }

    /// Run `batch` under the configured strategy
    pub fn run_default(&self, batch: Batch) -> EngineResult<RunReport> {
        self.run(batch, self.config.strategy)
    }

    /// Run `batch` under `strategy`; `cancel` interrupts blocked workers.
    ///
    /// Returns an error only when the batch or strategy does not fit the
    /// engine. Worker failures are reported in the [`RunReport`].
    pub fn run_with_cancel(
        &self,
        batch: Batch,
        strategy: Strategy,
        cancel: &CancellationToken,
    ) -> EngineResult<RunReport> {
        batch.validate_rows(self.row_count())?;
        if let Some(partitions) = strategy.partitions() {
            PartitionMap::new(self.row_count(), partitions)?;
        }

        let _guard = self.run_lock.lock();
        let ctx = ExecutionContext::new(
            &self.store,
            &self.locks,
            &self.log,
            self.events.as_ref(),
            cancel,
        )
        .with_metrics(&self.metrics)
        .with_poll_interval(self.config.poll_interval());

        let report = strategy.scheduler().execute(batch, &ctx);
        if !report.is_clean() {
            tracing::warn!(%strategy, errors = report.errors.len(), "run finished with errors");
        }
        Ok(report)
    }

    /// Copy of the execution log
    pub fn log(&self) -> Vec<Operation> {
        self.log.snapshot()
    }

    /// Clear the execution log between independent runs
    pub fn reset_log(&self) {
        let _guard = self.run_lock.lock();
        self.log.clear();
    }

    /// Verify the current execution log
    pub fn verify(&self) -> Verdict {
        self.verifier.verify(&self.log())
    }

    /// Current value of one row
    pub fn row_value(&self, row: impl Into<RowId>) -> EngineResult<Value> {
        Ok(self.store.get(row.into())?)
    }

    /// Current value of every row
    pub fn rows(&self) -> Vec<Value> {
        self.store.snapshot()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.store.len()
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Point-in-time copy of the metrics
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::from_metrics(&self.metrics)
    }

    /// Lock table, for inspection
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("log_len", &self.log.len())
            .finish()
    }
}
