// ── Actions and their factory ──
//
// Every state mutation is described by an Action: a routing tag (the
// resource path), the ancestor id chain addressing the target slice, and
// the mutation kind. Action creators are pure -- they never touch the
// network. The operations layer performs the HTTP call and dispatches
// the resulting action; this split is what lets the reducer be tested
// with no transport at all.

use std::sync::Arc;

use cirro_api::Page;
use serde_json::Value;

use crate::model::ResourceId;
use crate::resource::{ConfigError, ResourceConfig, ResourcePath};

/// The mutation an [`Action`] carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// A single created/updated entity payload; upserted with merge
    /// semantics.
    One(Value),
    /// One page of a collection; replaces the slice's order and count,
    /// upserts each entity.
    Many(Page<Value>),
    /// An entity was removed.
    Delete(ResourceId),
    /// A collection fetch started; the slice enters its loading state.
    FetchStart,
    /// A collection fetch failed; the slice records the error and leaves
    /// its loading state.
    FetchFailure(String),
    /// Drop all cached entities for the slice, keeping its filter.
    Invalidate,
    /// Replace the slice's server-side filter.
    SetFilter(Option<Value>),
}

impl ActionKind {
    /// Short tag used in diagnostics (`instances.ips/MANY`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::One(_) => "ONE",
            Self::Many(_) => "MANY",
            Self::Delete(_) => "DELETE",
            Self::FetchStart => "FETCH_START",
            Self::FetchFailure(_) => "FETCH_FAILURE",
            Self::Invalidate => "INVALIDATE",
            Self::SetFilter(_) => "SET_FILTER",
        }
    }
}

/// One dispatchable state mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Which config node this action targets.
    pub path: ResourcePath,
    /// Ancestor id chain, outermost first. Its length must equal the
    /// target node's depth; the reducer drops mismatched chains.
    pub ids: Vec<ResourceId>,
    pub kind: ActionKind,
}

impl Action {
    /// Diagnostic form, e.g. `instances.ips/ONE [42]`.
    pub fn describe(&self) -> String {
        format!("{}/{} {:?}", self.path, self.kind.tag(), self.ids)
    }
}

/// Produces action creators for one config node and, recursively, for
/// every descendant node.
///
/// Construction cannot fail: the config tree was validated when it was
/// built, and navigating to an unknown child is the only fallible step.
#[derive(Debug, Clone)]
pub struct ActionFactory {
    root: Arc<ResourceConfig>,
    path: ResourcePath,
}

impl ActionFactory {
    /// Factory for the root node of a config tree.
    pub fn new(root: Arc<ResourceConfig>) -> Self {
        let path = ResourcePath::root(root.name());
        Self { root, path }
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Shared root config this factory was derived from.
    pub fn root_config(&self) -> &Arc<ResourceConfig> {
        &self.root
    }

    /// Factory for a child node. Each level of nesting adds one ancestor
    /// id to every creator's chain.
    pub fn subresource(&self, name: &str) -> Result<Self, ConfigError> {
        let path = self.path.child(name);
        // Validate eagerly so a typo fails here, not at dispatch.
        self.root.node_at(&path)?;
        Ok(Self {
            root: Arc::clone(&self.root),
            path,
        })
    }

    // ── Creators ─────────────────────────────────────────────────────

    pub fn one(&self, payload: Value, ancestors: &[ResourceId]) -> Action {
        self.action(ActionKind::One(payload), ancestors)
    }

    pub fn many(&self, page: Page<Value>, ancestors: &[ResourceId]) -> Action {
        self.action(ActionKind::Many(page), ancestors)
    }

    pub fn delete(&self, id: impl Into<ResourceId>, ancestors: &[ResourceId]) -> Action {
        self.action(ActionKind::Delete(id.into()), ancestors)
    }

    pub fn fetch_start(&self, ancestors: &[ResourceId]) -> Action {
        self.action(ActionKind::FetchStart, ancestors)
    }

    pub fn fetch_failure(&self, error: impl Into<String>, ancestors: &[ResourceId]) -> Action {
        self.action(ActionKind::FetchFailure(error.into()), ancestors)
    }

    pub fn invalidate(&self, ancestors: &[ResourceId]) -> Action {
        self.action(ActionKind::Invalidate, ancestors)
    }

    pub fn set_filter(&self, filter: Option<Value>, ancestors: &[ResourceId]) -> Action {
        self.action(ActionKind::SetFilter(filter), ancestors)
    }

    fn action(&self, kind: ActionKind, ancestors: &[ResourceId]) -> Action {
        Action {
            path: self.path.clone(),
            ids: ancestors.to_vec(),
            kind,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resource::ALL_OPERATIONS;
    use serde_json::json;

    fn nodebalancers() -> Arc<ResourceConfig> {
        let nodes = ResourceConfig::builder("nodes")
            .operations(ALL_OPERATIONS)
            .build()
            .unwrap();
        let configs = ResourceConfig::builder("configs")
            .operations(ALL_OPERATIONS)
            .subresource(nodes)
            .build()
            .unwrap();
        Arc::new(
            ResourceConfig::builder("nodebalancers")
                .operations(ALL_OPERATIONS)
                .subresource(configs)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn one_carries_payload_and_path() {
        let factory = ActionFactory::new(nodebalancers());
        let action = factory.one(json!({"id": 23, "label": "nb-1"}), &[]);

        assert_eq!(action.path.to_string(), "nodebalancers");
        assert!(action.ids.is_empty());
        assert!(matches!(action.kind, ActionKind::One(_)));
    }

    #[test]
    fn delete_normalizes_id() {
        let factory = ActionFactory::new(nodebalancers());
        let action = factory.delete("23", &[]);

        assert_eq!(action.kind, ActionKind::Delete(ResourceId::Int(23)));
    }

    #[test]
    fn nested_factory_extends_path() {
        let factory = ActionFactory::new(nodebalancers());
        let nodes = factory
            .subresource("configs")
            .unwrap()
            .subresource("nodes")
            .unwrap();

        let action = nodes.one(
            json!({"id": 1, "address": "192.0.2.1:80"}),
            &[ResourceId::Int(7), ResourceId::Int(3)],
        );

        assert_eq!(action.path.to_string(), "nodebalancers.configs.nodes");
        assert_eq!(action.ids, vec![ResourceId::Int(7), ResourceId::Int(3)]);
    }

    #[test]
    fn unknown_subresource_fails_eagerly() {
        let factory = ActionFactory::new(nodebalancers());
        assert!(matches!(
            factory.subresource("backups"),
            Err(ConfigError::UnknownSubresource { .. })
        ));
    }

    #[test]
    fn describe_is_stable() {
        let factory = ActionFactory::new(nodebalancers());
        let action = factory.many(Page::empty(), &[]);
        assert_eq!(action.describe(), "nodebalancers/MANY []");
    }
}
