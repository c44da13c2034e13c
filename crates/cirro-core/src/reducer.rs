// ── Reducer generator ──
//
// One Reducer per config tree. It recognizes actions tagged with its own
// path and with every descendant's path, routing the latter down through
// the owning entity's `children` map. The reducer never panics: malformed
// payloads, unknown paths, wrong-length id chains, and absent parents are
// all dropped with a `warn!` diagnostic, leaving state untouched. A
// throwing reducer would take the whole consumer down with it.
//
// The dispatch timestamp is a parameter, not a clock read, so reductions
// are pure and tests control time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::action::{Action, ActionKind};
use crate::model::ResourceId;
use crate::resource::ResourceConfig;
use crate::state::{Entity, ResourceState};

/// Pure state-transition function for one config tree, synthesized from
/// the tree at construction time.
#[derive(Debug, Clone)]
pub struct Reducer {
    root: Arc<ResourceConfig>,
}

impl Reducer {
    pub fn new(root: Arc<ResourceConfig>) -> Self {
        Self { root }
    }

    /// The state a slice has before any action has touched it.
    pub fn initial_state() -> ResourceState {
        ResourceState::default()
    }

    /// Apply one action, returning the next state.
    ///
    /// Actions that do not target this tree (or are malformed) return the
    /// state unchanged.
    pub fn reduce(
        &self,
        state: ResourceState,
        action: &Action,
        now: DateTime<Utc>,
    ) -> ResourceState {
        let mut state = state;
        if action.path.root_name() == self.root.name() {
            Self::apply(&self.root, 0, &mut state, action, now);
        } else {
            debug!(
                action = %action.describe(),
                reducer = self.root.name(),
                "action targets a different tree, ignoring"
            );
        }
        state
    }

    // ── Routing ──────────────────────────────────────────────────────

    fn apply(
        config: &ResourceConfig,
        depth: usize,
        state: &mut ResourceState,
        action: &Action,
        now: DateTime<Utc>,
    ) {
        let segments = action.path.segments();

        if segments.len() == depth + 1 {
            if action.ids.len() == depth {
                Self::apply_direct(config, state, action, now);
            } else {
                warn!(
                    action = %action.describe(),
                    expected = depth,
                    "wrong ancestor id count, dropping action"
                );
            }
            return;
        }

        // Descendant action: the next path segment names the child slice,
        // the id at this depth names the owning entity.
        let Some(child_name) = segments.get(depth + 1) else {
            return;
        };
        let Some(child_config) = config.subresource(child_name) else {
            warn!(
                action = %action.describe(),
                resource = config.name(),
                "unknown subresource in action path, dropping action"
            );
            return;
        };
        let Some(owner_id) = action.ids.get(depth) else {
            warn!(
                action = %action.describe(),
                "ancestor id chain too short, dropping action"
            );
            return;
        };

        match state.items_by_id.get_mut(owner_id) {
            Some(owner) => {
                let child_state = owner.children.entry(child_name.clone()).or_default();
                Self::apply(child_config, depth + 1, child_state, action, now);
            }
            None => {
                // The sub-resource resolved before its parent. Dropping
                // is deliberate: synthesizing a placeholder parent would
                // surface a phantom entity to anything reading item_order.
                warn!(
                    action = %action.describe(),
                    resource = config.name(),
                    parent = %owner_id,
                    "owning entity not in store, dropping descendant action"
                );
            }
        }
    }

    // ── Direct handlers ──────────────────────────────────────────────

    fn apply_direct(
        config: &ResourceConfig,
        state: &mut ResourceState,
        action: &Action,
        now: DateTime<Utc>,
    ) {
        match &action.kind {
            ActionKind::One(payload) => {
                if Self::upsert(config, state, payload).is_some() {
                    state.last_updated = Some(now);
                }
            }
            ActionKind::Many(page) => {
                let mut order = Vec::with_capacity(page.data.len());
                for payload in &page.data {
                    if let Some(id) = Self::upsert(config, state, payload) {
                        order.push(id);
                    }
                }
                state.item_order = order;
                state.results_count = page.results;
                state.loading = false;
                state.error = None;
                state.last_updated = Some(now);
            }
            ActionKind::Delete(id) => {
                if state.items_by_id.remove(id).is_some() {
                    state.item_order.retain(|existing| existing != id);
                    state.results_count = state.results_count.saturating_sub(1);
                    state.last_updated = Some(now);
                } else {
                    debug!(
                        resource = config.name(),
                        %id,
                        "delete for entity not in store, ignoring"
                    );
                }
            }
            ActionKind::FetchStart => {
                state.loading = true;
                state.error = None;
            }
            ActionKind::FetchFailure(message) => {
                state.loading = false;
                state.error = Some(message.clone());
            }
            ActionKind::Invalidate => {
                state.items_by_id.clear();
                state.item_order.clear();
                state.results_count = 0;
            }
            ActionKind::SetFilter(filter) => {
                state.filter = filter.clone();
            }
        }
    }

    /// Insert-or-merge one payload. Incoming fields win; fields absent
    /// from the payload and all attached child slices survive. Returns
    /// the entity's id, or `None` if the payload was unusable.
    fn upsert(
        config: &ResourceConfig,
        state: &mut ResourceState,
        payload: &Value,
    ) -> Option<ResourceId> {
        let Some(fields) = payload.as_object() else {
            warn!(
                resource = config.name(),
                "entity payload is not an object, ignoring"
            );
            return None;
        };

        let Some(id) = fields
            .get(config.primary_key())
            .and_then(ResourceId::from_value)
        else {
            warn!(
                resource = config.name(),
                primary_key = config.primary_key(),
                "entity payload has no usable primary key, ignoring"
            );
            return None;
        };

        match state.items_by_id.get_mut(&id) {
            Some(existing) => existing.merge_fields(fields.clone()),
            None => {
                state
                    .items_by_id
                    .insert(id.clone(), Entity::new(fields.clone(), config));
            }
        }

        Some(id)
    }
}
