//! Event delegation: one handler on a container serving many descendants.
//!
//! The host tree (a DOM, a widget tree, a scene graph) is abstracted by
//! [`Tree`]. Candidate targets are queried at dispatch time, so elements
//! added after the delegation was set up are matched too.

use std::fmt;

/// Query surface a delegation needs from the host tree.
pub trait Tree {
    type Node: Clone + PartialEq;

    /// First node in the whole tree matching `selector`.
    fn query(&self, selector: &str) -> Option<Self::Node>;

    /// Descendants of `scope` matching `selector`, in document order.
    fn query_all(&self, scope: &Self::Node, selector: &str) -> Vec<Self::Node>;

    /// Whether `node` is `ancestor` or lies beneath it.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;
}

/// An event that bubbled up to the container.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<N> {
    pub kind: String,
    pub target: N,
}

impl<N> Event<N> {
    pub fn new(kind: impl Into<String>, target: N) -> Self {
        Self {
            kind: kind.into(),
            target,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DelegateError {
    #[error("delegate container \"{0}\" not found")]
    ContainerNotFound(String),
}

type Handler<N> = Box<dyn Fn(&Event<N>, &N) + Send + Sync>;

/// Handler attached to a container for one or more event types.
pub struct Delegation<N> {
    container: N,
    event_types: Vec<String>,
    selector: String,
    handler: Handler<N>,
}

impl<N: fmt::Debug> fmt::Debug for Delegation<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("container", &self.container)
            .field("event_types", &self.event_types)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl<N: Clone + PartialEq> Delegation<N> {
    pub fn new<H>(
        container: N,
        event_type: impl Into<String>,
        selector: impl Into<String>,
        handler: H,
    ) -> Self
    where
        H: Fn(&Event<N>, &N) + Send + Sync + 'static,
    {
        Self {
            container,
            event_types: vec![event_type.into()],
            selector: selector.into(),
            handler: Box::new(handler),
        }
    }

    /// Resolves the container by selector before delegating.
    pub fn find<T, H>(
        tree: &T,
        container_selector: &str,
        event_type: impl Into<String>,
        selector: impl Into<String>,
        handler: H,
    ) -> Result<Self, DelegateError>
    where
        T: Tree<Node = N>,
        H: Fn(&Event<N>, &N) + Send + Sync + 'static,
    {
        let container = tree.query(container_selector).ok_or_else(|| {
            #[cfg(feature = "tracing")]
            tracing::warn!("delegate container \"{container_selector}\" not found");

            DelegateError::ContainerNotFound(container_selector.to_owned())
        })?;
        Ok(Self::new(container, event_type, selector, handler))
    }

    /// Also listens for `event_type`.
    pub fn on(mut self, event_type: impl Into<String>) -> Self {
        let event_type = event_type.into();
        if !self.handles(&event_type) {
            self.event_types.push(event_type);
        }
        self
    }

    pub fn handles(&self, event_type: &str) -> bool {
        self.event_types.iter().any(|kind| kind == event_type)
    }

    pub fn container(&self) -> &N {
        &self.container
    }

    /// Routes `event` to the handler if its target is, or sits inside, a
    /// matching descendant. Returns the matched element.
    ///
    /// Only the first matching candidate in document order is handled.
    pub fn dispatch<T>(&self, tree: &T, event: &Event<N>) -> Option<N>
    where
        T: Tree<Node = N>,
    {
        if !self.handles(&event.kind) || !tree.contains(&self.container, &event.target) {
            return None;
        }

        let matched = tree
            .query_all(&self.container, &self.selector)
            .into_iter()
            .find(|candidate| candidate == &event.target || tree.contains(candidate, &event.target))?;
        (self.handler)(event, &matched);
        Some(matched)
    }
}
