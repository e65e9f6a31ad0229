//! Ordered middleware chain around the decision call.

use crate::plugins::{ActionMiddleware, ActionRequest, DecisionResponse};
use std::sync::Arc;

/// A chain of request/response transforms.
///
/// `before` hooks run in registration order on the way in; `after` hooks
/// run in reverse order on the way out.
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn ActionMiddleware>>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain from pre-registered middleware.
    #[must_use]
    pub fn from_slice(middleware: &[Arc<dyn ActionMiddleware>]) -> Self {
        Self {
            middleware: middleware.to_vec(),
        }
    }

    /// Appends a middleware to the chain.
    pub fn add(&mut self, middleware: Arc<dyn ActionMiddleware>) {
        self.middleware.push(middleware);
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns true if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Applies all `before` hooks in registration order.
    pub async fn apply_before(&self, mut request: ActionRequest) -> ActionRequest {
        for middleware in &self.middleware {
            request = middleware.before(request).await;
        }
        request
    }

    /// Applies all `after` hooks in reverse registration order.
    pub async fn apply_after(&self, mut response: DecisionResponse) -> DecisionResponse {
        for middleware in self.middleware.iter().rev() {
            response = middleware.after(response).await;
        }
        response
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.middleware.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Tags requests and responses so ordering is observable.
    struct Tagging(&'static str);

    #[async_trait]
    impl ActionMiddleware for Tagging {
        async fn before(&self, mut request: ActionRequest) -> ActionRequest {
            request.user = format!("{}>{}", request.user, self.0);
            request
        }

        async fn after(&self, mut response: DecisionResponse) -> DecisionResponse {
            response.content = format!("{}<{}", response.content, self.0);
            response
        }
    }

    #[tokio::test]
    async fn test_before_in_registration_order() {
        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(Tagging("a")));
        chain.add(Arc::new(Tagging("b")));

        let request = chain.apply_before(ActionRequest::new("x")).await;
        assert_eq!(request.user, "x>a>b");
    }

    #[tokio::test]
    async fn test_after_in_reverse_order() {
        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(Tagging("a")));
        chain.add(Arc::new(Tagging("b")));

        let response = chain.apply_after(DecisionResponse::new("y")).await;
        assert_eq!(response.content, "y<b<a");
    }

    #[tokio::test]
    async fn test_empty_chain_passthrough() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());

        let request = chain.apply_before(ActionRequest::new("x")).await;
        assert_eq!(request.user, "x");
    }
}
