//! Handler dependency graph built from produce/consume declarations.

use crate::core::{ArtifactDescriptor, ArtifactRequest, SecurityLevel};
use crate::errors::{BatchflowError, CycleDetectedError};
use crate::plugins::OutputHandler;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// An output handler together with its declarations, captured once.
pub struct HandlerBinding {
    handler: Arc<dyn OutputHandler>,
    name: String,
    produces: Vec<ArtifactDescriptor>,
    consumes: Vec<ArtifactRequest>,
}

impl HandlerBinding {
    /// Captures a handler's name and declarations.
    #[must_use]
    pub fn new(handler: Arc<dyn OutputHandler>) -> Self {
        let name = handler.name().to_string();
        let produces = handler.produces();
        let consumes = handler
            .consumes()
            .iter()
            .map(|token| ArtifactRequest::parse(token))
            .collect();
        Self {
            handler,
            name,
            produces,
            consumes,
        }
    }

    /// The handler's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn OutputHandler> {
        &self.handler
    }

    /// Declared produced artifacts.
    #[must_use]
    pub fn produces(&self) -> &[ArtifactDescriptor] {
        &self.produces
    }

    /// Parsed consumption requests.
    #[must_use]
    pub fn consumes(&self) -> &[ArtifactRequest] {
        &self.consumes
    }

    /// The handler's clearance.
    #[must_use]
    pub fn clearance(&self) -> SecurityLevel {
        self.handler.clearance()
    }
}

impl std::fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("name", &self.name)
            .field("produces", &self.produces.len())
            .field("consumes", &self.consumes.len())
            .finish()
    }
}

/// Execution order over handler bindings, derived from their declarations.
///
/// A handler depends on every handler producing an artifact it consumes.
/// Validation runs before any handler executes: dependency cycles,
/// duplicate aliases and alias requests with no declared producer are all
/// rejected up front. A handler consuming an artifact type it also
/// produces does not depend on itself.
#[derive(Debug)]
pub struct HandlerGraph {
    order: Vec<usize>,
}

impl HandlerGraph {
    /// Builds and validates the graph, returning a dependency-respecting
    /// execution order.
    ///
    /// Handlers with no ordering constraint between them keep their
    /// registration order.
    ///
    /// Alias requests with no declared producer are rejected here,
    /// before any handler writes, rather than when the consuming
    /// handler resolves them: only declared descriptors ever reach the
    /// store, so such a request could never resolve. Type requests stay
    /// lazy and may resolve to nothing.
    pub fn build(bindings: &[HandlerBinding]) -> Result<Self, BatchflowError> {
        let mut alias_producer: HashMap<&str, usize> = HashMap::new();
        let mut kind_producers: HashMap<&str, Vec<usize>> = HashMap::new();

        for (index, binding) in bindings.iter().enumerate() {
            for descriptor in binding.produces() {
                if let Some(alias) = &descriptor.alias {
                    if alias_producer.insert(alias.as_str(), index).is_some() {
                        return Err(BatchflowError::DuplicateArtifact(alias.clone()));
                    }
                }
                kind_producers
                    .entry(descriptor.kind.as_str())
                    .or_default()
                    .push(index);
            }
        }

        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); bindings.len()];
        for (index, binding) in bindings.iter().enumerate() {
            let mut seen = HashSet::new();
            for request in binding.consumes() {
                match request {
                    ArtifactRequest::Alias(alias) => {
                        let Some(&producer) = alias_producer.get(alias.as_str()) else {
                            return Err(BatchflowError::UnresolvedArtifact(request.token()));
                        };
                        if producer != index && seen.insert(producer) {
                            dependencies[index].push(producer);
                        }
                    }
                    ArtifactRequest::Type(kind) => {
                        for &producer in
                            kind_producers.get(kind.as_str()).map_or(&[][..], Vec::as_slice)
                        {
                            if producer != index && seen.insert(producer) {
                                dependencies[index].push(producer);
                            }
                        }
                    }
                }
            }
        }

        let order = Self::topological_order(bindings, &dependencies)?;
        Ok(Self { order })
    }

    /// The validated execution order, as indexes into the bindings slice.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    fn topological_order(
        bindings: &[HandlerBinding],
        dependencies: &[Vec<usize>],
    ) -> Result<Vec<usize>, CycleDetectedError> {
        const UNVISITED: u8 = 0;
        const IN_STACK: u8 = 1;
        const DONE: u8 = 2;

        fn visit(
            node: usize,
            bindings: &[HandlerBinding],
            dependencies: &[Vec<usize>],
            state: &mut [u8],
            path: &mut Vec<usize>,
            order: &mut Vec<usize>,
        ) -> Result<(), CycleDetectedError> {
            state[node] = IN_STACK;
            path.push(node);

            for &dependency in &dependencies[node] {
                match state[dependency] {
                    DONE => {}
                    IN_STACK => {
                        let start = path
                            .iter()
                            .position(|&n| n == dependency)
                            .unwrap_or_default();
                        let mut cycle: Vec<String> = path[start..]
                            .iter()
                            .map(|&n| bindings[n].name().to_string())
                            .collect();
                        cycle.push(bindings[dependency].name().to_string());
                        return Err(CycleDetectedError::new(cycle));
                    }
                    _ => visit(dependency, bindings, dependencies, state, path, order)?,
                }
            }

            path.pop();
            state[node] = DONE;
            order.push(node);
            Ok(())
        }

        let mut state = vec![UNVISITED; bindings.len()];
        let mut path = Vec::new();
        let mut order = Vec::new();
        for node in 0..bindings.len() {
            if state[node] == UNVISITED {
                visit(node, bindings, dependencies, &mut state, &mut path, &mut order)?;
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::RecordingHandler;

    fn binding(handler: RecordingHandler) -> HandlerBinding {
        HandlerBinding::new(Arc::new(handler))
    }

    fn names(bindings: &[HandlerBinding], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| bindings[i].name().to_string()).collect()
    }

    #[test]
    fn test_independent_handlers_keep_registration_order() {
        let bindings = vec![
            binding(RecordingHandler::new("first")),
            binding(RecordingHandler::new("second")),
            binding(RecordingHandler::new("third")),
        ];

        let graph = HandlerGraph::build(&bindings).unwrap();
        assert_eq!(names(&bindings, graph.order()), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_producer_ordered_before_consumer() {
        let bindings = vec![
            binding(RecordingHandler::new("packager").consuming("@results_csv")),
            binding(
                RecordingHandler::new("csv_writer")
                    .producing(ArtifactDescriptor::new("out", "csv").with_alias("results_csv")),
            ),
        ];

        let graph = HandlerGraph::build(&bindings).unwrap();
        assert_eq!(names(&bindings, graph.order()), vec!["csv_writer", "packager"]);
    }

    #[test]
    fn test_type_consumer_depends_on_all_producers() {
        let bindings = vec![
            binding(RecordingHandler::new("archiver").consuming("type:csv")),
            binding(
                RecordingHandler::new("writer_a")
                    .producing(ArtifactDescriptor::new("a", "csv")),
            ),
            binding(
                RecordingHandler::new("writer_b")
                    .producing(ArtifactDescriptor::new("b", "csv")),
            ),
        ];

        let graph = HandlerGraph::build(&bindings).unwrap();
        let order = names(&bindings, graph.order());
        let archiver = order.iter().position(|n| n == "archiver").unwrap();
        assert!(archiver > order.iter().position(|n| n == "writer_a").unwrap());
        assert!(archiver > order.iter().position(|n| n == "writer_b").unwrap());
    }

    #[test]
    fn test_mixed_alias_and_type_consumers() {
        let bindings = vec![
            binding(
                RecordingHandler::new("zipper")
                    .consuming("@csv")
                    .producing(ArtifactDescriptor::new("bundle", "zip")),
            ),
            binding(RecordingHandler::new("auditor").consuming("type:csv")),
            binding(
                RecordingHandler::new("csv_writer")
                    .producing(ArtifactDescriptor::new("out", "csv").with_alias("csv")),
            ),
        ];

        let graph = HandlerGraph::build(&bindings).unwrap();
        let order = names(&bindings, graph.order());
        let writer = order.iter().position(|n| n == "csv_writer").unwrap();
        assert!(writer < order.iter().position(|n| n == "zipper").unwrap());
        assert!(writer < order.iter().position(|n| n == "auditor").unwrap());
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let bindings = vec![
            binding(
                RecordingHandler::new("a")
                    .producing(ArtifactDescriptor::new("a_out", "x").with_alias("a_out"))
                    .consuming("@b_out"),
            ),
            binding(
                RecordingHandler::new("b")
                    .producing(ArtifactDescriptor::new("b_out", "y").with_alias("b_out"))
                    .consuming("@a_out"),
            ),
        ];

        let error = HandlerGraph::build(&bindings).unwrap_err();
        let BatchflowError::CycleDetected(cycle) = error else {
            panic!("expected cycle error, got {error}");
        };
        assert_eq!(cycle.cycle_path.first(), cycle.cycle_path.last());
        assert!(cycle.cycle_path.len() >= 3);
    }

    #[test]
    fn test_unknown_alias_rejected_up_front() {
        let bindings = vec![binding(RecordingHandler::new("lonely").consuming("@ghost"))];

        let error = HandlerGraph::build(&bindings).unwrap_err();
        assert!(matches!(error, BatchflowError::UnresolvedArtifact(_)));
    }

    #[test]
    fn test_duplicate_alias_rejected_up_front() {
        let bindings = vec![
            binding(
                RecordingHandler::new("a")
                    .producing(ArtifactDescriptor::new("out", "csv").with_alias("shared")),
            ),
            binding(
                RecordingHandler::new("b")
                    .producing(ArtifactDescriptor::new("out", "zip").with_alias("shared")),
            ),
        ];

        let error = HandlerGraph::build(&bindings).unwrap_err();
        assert!(matches!(error, BatchflowError::DuplicateArtifact(_)));
    }

    #[test]
    fn test_self_type_consumption_is_not_a_cycle() {
        let bindings = vec![binding(
            RecordingHandler::new("csv_writer")
                .producing(ArtifactDescriptor::new("out", "csv"))
                .consuming("type:csv"),
        )];

        let graph = HandlerGraph::build(&bindings).unwrap();
        assert_eq!(graph.order(), &[0]);
    }
}
