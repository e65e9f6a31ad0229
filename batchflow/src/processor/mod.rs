//! Per-item processing: render, decide, transform.
//!
//! Produces exactly one [`Record`] or one [`Failure`] per input item.
//! Rendering failures, decision failures after retry exhaustion, and
//! transform-plugin errors all become failures for that item only; the
//! cycle continues.

use crate::core::{ErrorKind, Failure, Item, Record, RetryHistory, SecurityLevel};
use crate::executor::ActionExecutor;
use crate::plugins::{CompiledTemplate, TransformPlugin};
use std::collections::HashMap;
use std::sync::Arc;

/// A named decision criterion with its compiled request template.
#[derive(Clone)]
pub struct Criterion {
    /// The criterion name, keying its response on the record.
    pub name: String,
    /// The compiled template rendering this criterion's request.
    pub template: Arc<dyn CompiledTemplate>,
}

impl Criterion {
    /// Creates a new criterion.
    #[must_use]
    pub fn new(name: impl Into<String>, template: Arc<dyn CompiledTemplate>) -> Self {
        Self {
            name: name.into(),
            template,
        }
    }
}

impl std::fmt::Debug for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Criterion").field("name", &self.name).finish()
    }
}

/// The outcome of processing one item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// The item produced a record.
    Success(Box<Record>),
    /// The item terminally failed.
    Failed(Box<Failure>),
}

impl ItemOutcome {
    /// Returns true for a success outcome.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Produces one record or one failure per input item.
pub struct ItemProcessor {
    criteria: Vec<Criterion>,
    executor: Arc<ActionExecutor>,
    transforms: Vec<Arc<dyn TransformPlugin>>,
    security: Option<SecurityLevel>,
}

impl ItemProcessor {
    /// Creates a processor over the given criteria.
    #[must_use]
    pub fn new(criteria: Vec<Criterion>, executor: Arc<ActionExecutor>) -> Self {
        Self {
            criteria,
            executor,
            transforms: Vec::new(),
            security: None,
        }
    }

    /// Sets the transform plugins, run in registration order.
    #[must_use]
    pub fn with_transforms(mut self, transforms: Vec<Arc<dyn TransformPlugin>>) -> Self {
        self.transforms = transforms;
        self
    }

    /// Sets the active security classification attached to records.
    #[must_use]
    pub fn with_security(mut self, security: Option<SecurityLevel>) -> Self {
        self.security = security;
        self
    }

    /// Processes one item into exactly one record or failure.
    pub async fn process(&self, item: Item, item_index: usize) -> ItemOutcome {
        let mut responses: HashMap<String, String> = HashMap::new();
        let mut metrics = crate::core::Fields::new();
        let mut history = RetryHistory::new();

        for criterion in &self.criteria {
            let request = match criterion.template.render(&item) {
                Ok(request) => request
                    .with_metadata("criterion", serde_json::json!(criterion.name))
                    .with_metadata("item_index", serde_json::json!(item_index)),
                Err(error) => {
                    tracing::debug!(item_index, criterion = %criterion.name, %error, "Render failed");
                    let mut failure =
                        Failure::new(item, error.to_string(), ErrorKind::Rendering);
                    // keep attempts made for earlier criteria on the failure
                    if !history.is_trivial() {
                        failure = failure.with_retry(history);
                    }
                    return ItemOutcome::Failed(Box::new(failure));
                }
            };

            match self.executor.execute(request).await {
                Ok(outcome) => {
                    responses.insert(criterion.name.clone(), outcome.response.content);
                    metrics.extend(outcome.response.metrics);
                    if !outcome.history.is_trivial() {
                        history.merge(outcome.history);
                    }
                }
                Err(error) => {
                    tracing::debug!(item_index, criterion = %criterion.name, %error, "Action exhausted");
                    let message = error.message.clone();
                    let mut item_history = history;
                    item_history.merge(error.history);
                    return ItemOutcome::Failed(Box::new(
                        Failure::new(item, message, ErrorKind::Action).with_retry(item_history),
                    ));
                }
            }
        }

        // Transform errors fail only the affected item.
        for transform in &self.transforms {
            match transform.transform(&item, &responses) {
                Ok(fields) => metrics.extend(fields),
                Err(error) => {
                    tracing::warn!(item_index, plugin = transform.name(), %error, "Transform failed");
                    let mut failure =
                        Failure::new(item, error.to_string(), ErrorKind::Plugin);
                    if !history.is_trivial() {
                        failure = failure.with_retry(history);
                    }
                    return ItemOutcome::Failed(Box::new(failure));
                }
            }
        }

        ItemOutcome::Success(Box::new(Record {
            item,
            responses,
            metrics,
            retry: (!history.is_trivial()).then_some(history),
            security: self.security,
        }))
    }
}

impl std::fmt::Debug for ItemProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemProcessor")
            .field("criteria", &self.criteria.len())
            .field("transforms", &self.transforms.len())
            .field("security", &self.security)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DecisionError, PluginError};
    use crate::executor::RetryConfig;
    use crate::plugins::{DecisionResponse, TemplateEngine};
    use crate::testing::mocks::{FieldTemplate, ScriptedClient};

    fn criterion(name: &str) -> Criterion {
        Criterion::new(name, FieldTemplate::new("text").compile().unwrap())
    }

    fn executor(client: ScriptedClient) -> Arc<ActionExecutor> {
        Arc::new(ActionExecutor::new(
            Arc::new(client),
            RetryConfig::new().with_max_attempts(2).with_initial_delay_ms(1),
        ))
    }

    fn item(json: serde_json::Value) -> Item {
        Item::from_value(json)
    }

    #[tokio::test]
    async fn test_single_criterion_success() {
        let processor = ItemProcessor::new(
            vec![criterion("default")],
            executor(ScriptedClient::always_ok("fine")),
        );

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Success(record) = outcome else {
            panic!("expected success");
        };
        assert_eq!(record.default_response(), Some("fine"));
        assert!(record.retry.is_none());
    }

    #[tokio::test]
    async fn test_render_failure_becomes_failure() {
        let processor = ItemProcessor::new(
            vec![criterion("default")],
            executor(ScriptedClient::always_ok("fine")),
        );

        let outcome = processor.process(item(serde_json::json!({"no_text": 1})), 0).await;
        let ItemOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, ErrorKind::Rendering);
    }

    #[tokio::test]
    async fn test_multiple_criteria_collect_responses() {
        let client = ScriptedClient::new(vec![
            Ok(DecisionResponse::new("tone: warm")),
            Ok(DecisionResponse::new("clarity: high")),
        ]);
        let processor = ItemProcessor::new(
            vec![criterion("tone"), criterion("clarity")],
            executor(client),
        );

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Success(record) = outcome else {
            panic!("expected success");
        };
        assert_eq!(record.responses.len(), 2);
        assert_eq!(record.responses.get("tone").map(String::as_str), Some("tone: warm"));
    }

    #[tokio::test]
    async fn test_response_metrics_merged() {
        let client = ScriptedClient::new(vec![Ok(
            DecisionResponse::new("ok").with_metric("score", serde_json::json!(0.7))
        )]);
        let processor = ItemProcessor::new(vec![criterion("default")], executor(client));

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Success(record) = outcome else {
            panic!("expected success");
        };
        assert_eq!(record.metrics.get("score"), Some(&serde_json::json!(0.7)));
    }

    struct LengthTransform;

    impl TransformPlugin for LengthTransform {
        fn name(&self) -> &str {
            "length"
        }

        fn transform(
            &self,
            _item: &Item,
            responses: &HashMap<String, String>,
        ) -> Result<crate::core::Fields, PluginError> {
            let total: usize = responses.values().map(String::len).sum();
            let mut fields = crate::core::Fields::new();
            fields.insert("response_chars".to_string(), serde_json::json!(total));
            Ok(fields)
        }
    }

    struct BrokenTransform;

    impl TransformPlugin for BrokenTransform {
        fn name(&self) -> &str {
            "broken"
        }

        fn transform(
            &self,
            _item: &Item,
            _responses: &HashMap<String, String>,
        ) -> Result<crate::core::Fields, PluginError> {
            Err(PluginError::new("broken", "no can do"))
        }
    }

    #[tokio::test]
    async fn test_transform_fields_merged() {
        let processor = ItemProcessor::new(
            vec![criterion("default")],
            executor(ScriptedClient::always_ok("four")),
        )
        .with_transforms(vec![Arc::new(LengthTransform)]);

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Success(record) = outcome else {
            panic!("expected success");
        };
        assert_eq!(record.metrics.get("response_chars"), Some(&serde_json::json!(4)));
    }

    #[tokio::test]
    async fn test_transform_error_fails_item() {
        let processor = ItemProcessor::new(
            vec![criterion("default")],
            executor(ScriptedClient::always_ok("ok")),
        )
        .with_transforms(vec![Arc::new(BrokenTransform)]);

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, ErrorKind::Plugin);
    }

    #[tokio::test]
    async fn test_transform_failure_keeps_retry_history() {
        let client = ScriptedClient::new(vec![
            Err(DecisionError::new("timeout")),
            Ok(DecisionResponse::new("ok")),
        ]);
        let processor = ItemProcessor::new(vec![criterion("default")], executor(client))
            .with_transforms(vec![Arc::new(BrokenTransform)]);

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, ErrorKind::Plugin);
        assert_eq!(failure.retry.as_ref().map(|h| h.attempts), Some(2));
    }

    #[tokio::test]
    async fn test_later_render_failure_keeps_retry_history() {
        let client = ScriptedClient::new(vec![
            Err(DecisionError::new("timeout")),
            Ok(DecisionResponse::new("ok")),
        ]);
        let second = Criterion::new("second", FieldTemplate::new("absent").compile().unwrap());
        let processor = ItemProcessor::new(vec![criterion("first"), second], executor(client));

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, ErrorKind::Rendering);
        // the first criterion's two attempts stay on the failure
        assert_eq!(failure.retry.as_ref().map(|h| h.attempts), Some(2));
    }

    #[tokio::test]
    async fn test_action_exhaustion_keeps_history() {
        let processor = ItemProcessor::new(
            vec![criterion("default")],
            executor(ScriptedClient::always_err("down")),
        );

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, ErrorKind::Action);
        assert_eq!(failure.retry.as_ref().map(|h| h.attempts), Some(2));
    }

    #[tokio::test]
    async fn test_retry_history_attached_on_success() {
        let client = ScriptedClient::new(vec![
            Err(DecisionError::new("timeout")),
            Ok(DecisionResponse::new("ok")),
        ]);
        let processor = ItemProcessor::new(vec![criterion("default")], executor(client));

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Success(record) = outcome else {
            panic!("expected success");
        };
        assert_eq!(record.attempts(), 2);
    }

    #[tokio::test]
    async fn test_security_attached() {
        let processor = ItemProcessor::new(
            vec![criterion("default")],
            executor(ScriptedClient::always_ok("ok")),
        )
        .with_security(Some(SecurityLevel::Confidential));

        let outcome = processor.process(item(serde_json::json!({"text": "hi"})), 0).await;
        let ItemOutcome::Success(record) = outcome else {
            panic!("expected success");
        };
        assert_eq!(record.security, Some(SecurityLevel::Confidential));
    }
}
