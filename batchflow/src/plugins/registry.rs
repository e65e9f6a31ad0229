//! Explicit plugin registry, constructed once and passed by injection.

use super::{
    ActionMiddleware, AggregationPlugin, HaltCondition, OutputHandler, TransformPlugin,
};
use std::sync::Arc;

/// Registry of the plugins participating in a cycle.
///
/// A plain value with no global state: build it at startup and hand it to
/// the cycle coordinator and the output pipeline by reference. Fake
/// registries in tests are just empty or partially filled values.
#[derive(Default)]
pub struct PluginRegistry {
    transforms: Vec<Arc<dyn TransformPlugin>>,
    aggregators: Vec<Arc<dyn AggregationPlugin>>,
    halt_conditions: Vec<Arc<dyn HaltCondition>>,
    middleware: Vec<Arc<dyn ActionMiddleware>>,
    handlers: Vec<Arc<dyn OutputHandler>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transform plugin.
    #[must_use]
    pub fn with_transform(mut self, plugin: Arc<dyn TransformPlugin>) -> Self {
        self.transforms.push(plugin);
        self
    }

    /// Registers an aggregation plugin.
    #[must_use]
    pub fn with_aggregator(mut self, plugin: Arc<dyn AggregationPlugin>) -> Self {
        self.aggregators.push(plugin);
        self
    }

    /// Registers a halt condition.
    #[must_use]
    pub fn with_halt_condition(mut self, plugin: Arc<dyn HaltCondition>) -> Self {
        self.halt_conditions.push(plugin);
        self
    }

    /// Registers an action middleware.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn ActionMiddleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Registers an output handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn OutputHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// The registered transform plugins, in registration order.
    #[must_use]
    pub fn transforms(&self) -> &[Arc<dyn TransformPlugin>] {
        &self.transforms
    }

    /// The registered aggregation plugins, in registration order.
    #[must_use]
    pub fn aggregators(&self) -> &[Arc<dyn AggregationPlugin>] {
        &self.aggregators
    }

    /// The registered halt conditions, in registration order.
    #[must_use]
    pub fn halt_conditions(&self) -> &[Arc<dyn HaltCondition>] {
        &self.halt_conditions
    }

    /// The registered action middleware, in registration order.
    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn ActionMiddleware>] {
        &self.middleware
    }

    /// The registered output handlers, in registration order.
    #[must_use]
    pub fn handlers(&self) -> &[Arc<dyn OutputHandler>] {
        &self.handlers
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("transforms", &self.transforms.len())
            .field("aggregators", &self.aggregators.len())
            .field("halt_conditions", &self.halt_conditions.len())
            .field("middleware", &self.middleware.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Fields, Item, Record};
    use crate::errors::PluginError;
    use std::collections::HashMap;

    struct NoOpTransform;

    impl TransformPlugin for NoOpTransform {
        fn name(&self) -> &str {
            "noop"
        }

        fn transform(
            &self,
            _item: &Item,
            _responses: &HashMap<String, String>,
        ) -> Result<Fields, PluginError> {
            Ok(Fields::new())
        }
    }

    struct NoOpAggregator;

    impl AggregationPlugin for NoOpAggregator {
        fn name(&self) -> &str {
            "noop"
        }

        fn aggregate(&self, _records: &[Record]) -> Result<Fields, PluginError> {
            Ok(Fields::new())
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = PluginRegistry::new();
        assert!(registry.transforms().is_empty());
        assert!(registry.handlers().is_empty());
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = PluginRegistry::new()
            .with_transform(Arc::new(NoOpTransform))
            .with_aggregator(Arc::new(NoOpAggregator));

        assert_eq!(registry.transforms().len(), 1);
        assert_eq!(registry.aggregators().len(), 1);
        assert_eq!(registry.transforms()[0].name(), "noop");
    }
}
