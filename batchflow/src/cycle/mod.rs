//! Cycle coordination: checkpoint filtering, dispatch and payload assembly.
//!
//! A cycle runs one dataset end to end:
//! - Compiles every criterion template once; a compile failure is fatal
//! - Drops items the checkpoint already recorded as complete
//! - Dispatches pending items sequentially or with bounded concurrency
//! - Stops admitting new items once a halt condition trips; in-flight
//!   items still finish and are kept
//! - Assembles exactly one payload, with records restored to original
//!   dataset order

mod aggregator;

pub use aggregator::ResultAggregator;


use crate::checkpoint::CheckpointStore;
use crate::core::{CycleMetadata, Fields, Item, Payload, Record, SecurityLevel};
use crate::errors::BatchflowError;
use crate::executor::{ActionExecutor, MiddlewareChain, RetryConfig};
use crate::halt::EarlyStopCoordinator;
use crate::plugins::{
    AdmissionControl, DecisionClient, PluginRegistry, TemplateEngine, UsageTracker,
};
use crate::processor::{Criterion, ItemOutcome, ItemProcessor};
use crate::utils::{iso_timestamp, RunIdentity};
use chrono::SecondsFormat;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Tunable knobs for one cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Maximum items in flight at once. 1 means sequential.
    pub concurrency: usize,
    /// Retry policy for the decision step.
    pub retry: RetryConfig,
    /// Classification attached to every record and the payload metadata.
    pub security: Option<SecurityLevel>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            retry: RetryConfig::default(),
            security: None,
        }
    }
}

impl CycleConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit, floored at 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the active security classification.
    #[must_use]
    pub fn with_security(mut self, security: SecurityLevel) -> Self {
        self.security = Some(security);
        self
    }
}

/// Runs cycles over a dataset.
///
/// Built once and reusable across cycles; each [`run`](Self::run) call
/// gets a fresh run identity, halt state and aggregator.
pub struct CycleCoordinator {
    client: Arc<dyn DecisionClient>,
    registry: Arc<PluginRegistry>,
    config: CycleConfig,
    templates: Vec<(String, Arc<dyn TemplateEngine>)>,
    checkpoint: Option<Arc<CheckpointStore>>,
    admission: Option<Arc<dyn AdmissionControl>>,
    usage: Option<Arc<dyn UsageTracker>>,
}

impl CycleCoordinator {
    /// Creates a coordinator with no criteria configured.
    #[must_use]
    pub fn new(
        client: Arc<dyn DecisionClient>,
        registry: Arc<PluginRegistry>,
        config: CycleConfig,
    ) -> Self {
        Self {
            client,
            registry,
            config,
            templates: Vec::new(),
            checkpoint: None,
            admission: None,
            usage: None,
        }
    }

    /// Adds a named criterion; its template is compiled at cycle start.
    #[must_use]
    pub fn with_template(
        mut self,
        name: impl Into<String>,
        engine: Arc<dyn TemplateEngine>,
    ) -> Self {
        self.templates.push((name.into(), engine));
        self
    }

    /// Sets the checkpoint store.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Arc<CheckpointStore>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Sets the admission-control collaborator.
    #[must_use]
    pub fn with_admission(mut self, admission: Arc<dyn AdmissionControl>) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Sets the usage-accounting collaborator.
    #[must_use]
    pub fn with_usage(mut self, usage: Arc<dyn UsageTracker>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Runs one cycle over the dataset and assembles its payload.
    ///
    /// A completed cycle always yields a payload, even when every item
    /// failed. The only hard errors are template compilation, having no
    /// criteria at all, and a panicked worker task.
    pub async fn run(&self, items: Vec<Item>) -> Result<Payload, BatchflowError> {
        let identity = RunIdentity::new();
        let total_items = items.len();

        let criteria = self.compile_criteria()?;
        let executor = self.build_executor();

        let pending = match &self.checkpoint {
            Some(checkpoint) => checkpoint.filter_pending(items),
            None => items,
        };
        let skipped = total_items - pending.len();
        tracing::info!(
            run_id = %identity.run_id,
            total_items,
            skipped,
            concurrency = self.config.concurrency,
            "Starting cycle"
        );

        let processor = Arc::new(
            ItemProcessor::new(criteria, executor)
                .with_transforms(self.registry.transforms().to_vec())
                .with_security(self.config.security),
        );

        let halt = EarlyStopCoordinator::new(self.registry.halt_conditions().to_vec());
        halt.reset();
        let aggregator = ResultAggregator::new();

        if self.config.concurrency <= 1 {
            self.run_sequential(pending, &processor, &halt, &aggregator)
                .await;
        } else {
            self.run_parallel(pending, &processor, &halt, &aggregator)
                .await?;
        }

        let succeeded = aggregator.succeeded();
        let failed = aggregator.failed();
        let (results, failures) = aggregator.finish();
        let retry = ResultAggregator::retry_summary(&results, &failures);
        let aggregates = self.run_aggregators(&results);
        let cost = self.usage.as_ref().map(|u| u.summary()).unwrap_or_default();

        let metadata = CycleMetadata {
            run_id: identity.run_id.to_string(),
            started_at: identity
                .started_at
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            finished_at: iso_timestamp(),
            total_items,
            skipped,
            processed: succeeded + failed,
            succeeded,
            failed,
            retry,
            halt: halt.reason(),
            security: self.config.security,
            aggregates: aggregates.clone(),
            cost: cost.clone(),
        };
        tracing::info!(
            run_id = %metadata.run_id,
            succeeded,
            failed,
            halted = metadata.halt.is_some(),
            "Cycle finished"
        );

        Ok(Payload {
            results,
            failures,
            aggregates,
            cost,
            metadata,
        })
    }

    fn compile_criteria(&self) -> Result<Vec<Criterion>, BatchflowError> {
        if self.templates.is_empty() {
            return Err(BatchflowError::Template(
                "no criteria configured".to_string(),
            ));
        }
        self.templates
            .iter()
            .map(|(name, engine)| {
                let compiled = engine.compile().map_err(|error| {
                    BatchflowError::Template(format!("criterion '{name}': {error}"))
                })?;
                Ok(Criterion::new(name.clone(), compiled))
            })
            .collect()
    }

    fn build_executor(&self) -> Arc<ActionExecutor> {
        let mut executor = ActionExecutor::new(self.client.clone(), self.config.retry.clone())
            .with_middleware(MiddlewareChain::from_slice(self.registry.middleware()));
        if let Some(admission) = &self.admission {
            executor = executor.with_admission(admission.clone());
        }
        if let Some(usage) = &self.usage {
            executor = executor.with_usage(usage.clone());
        }
        Arc::new(executor)
    }

    async fn run_sequential(
        &self,
        pending: Vec<Item>,
        processor: &ItemProcessor,
        halt: &EarlyStopCoordinator,
        aggregator: &ResultAggregator,
    ) {
        for (index, item) in pending.into_iter().enumerate() {
            if halt.is_tripped() {
                break;
            }
            let outcome = processor.process(item, index).await;
            self.complete(index, outcome, halt, aggregator);
        }
    }

    async fn run_parallel(
        &self,
        pending: Vec<Item>,
        processor: &Arc<ItemProcessor>,
        halt: &EarlyStopCoordinator,
        aggregator: &ResultAggregator,
    ) -> Result<(), BatchflowError> {
        let mut queue = pending.into_iter().enumerate();
        let mut inflight: FuturesUnordered<JoinHandle<(usize, ItemOutcome)>> =
            FuturesUnordered::new();

        for _ in 0..self.config.concurrency {
            let Some((index, item)) = queue.next() else {
                break;
            };
            inflight.push(Self::dispatch(processor, index, item));
        }

        // completed items are handled here, on the coordinator side, so
        // checkpoint appends and halt checks stay serialized
        while let Some(joined) = inflight.next().await {
            let (index, outcome) = joined.map_err(|error| {
                BatchflowError::Internal(format!("worker task failed: {error}"))
            })?;
            self.complete(index, outcome, halt, aggregator);

            if !halt.is_tripped() {
                if let Some((index, item)) = queue.next() {
                    inflight.push(Self::dispatch(processor, index, item));
                }
            }
        }
        Ok(())
    }

    fn dispatch(
        processor: &Arc<ItemProcessor>,
        index: usize,
        item: Item,
    ) -> JoinHandle<(usize, ItemOutcome)> {
        let processor = Arc::clone(processor);
        tokio::spawn(async move { (index, processor.process(item, index).await) })
    }

    fn complete(
        &self,
        index: usize,
        outcome: ItemOutcome,
        halt: &EarlyStopCoordinator,
        aggregator: &ResultAggregator,
    ) {
        if let ItemOutcome::Success(record) = &outcome {
            if let Some(checkpoint) = &self.checkpoint {
                if let Some(id) = record.item.identifier(checkpoint.key_field()) {
                    if let Err(error) = checkpoint.mark_complete(&id) {
                        tracing::warn!(%error, id = %id, "Checkpoint append failed; continuing");
                    }
                }
            }
            halt.check_record(record, index);
        }
        aggregator.add(index, outcome);
    }

    fn run_aggregators(&self, results: &[Record]) -> Fields {
        let mut aggregates = Fields::new();
        for plugin in self.registry.aggregators() {
            match plugin.aggregate(results) {
                Ok(fields) => match serde_json::to_value(fields) {
                    Ok(value) => {
                        aggregates.insert(plugin.name().to_string(), value);
                    }
                    Err(error) => {
                        tracing::warn!(plugin = plugin.name(), %error, "Unserializable aggregate");
                    }
                },
                Err(error) => {
                    tracing::warn!(plugin = plugin.name(), %error, "Aggregation plugin failed; skipping");
                }
            }
        }
        aggregates
    }
}

impl std::fmt::Debug for CycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleCoordinator")
            .field("config", &self.config)
            .field("criteria", &self.templates.len())
            .field("checkpoint", &self.checkpoint.is_some())
            .finish()
    }
}
