// ── The store ──
//
// One Store holds the state for every mounted config tree. It is the
// single writer: all mutation goes through `dispatch`, which applies one
// action atomically and publishes the new snapshot through a `watch`
// channel. Readers get cheap `Arc` snapshots and never observe a
// half-applied action.
//
// The store is an explicit value -- consumers receive it as an argument,
// there is no process-global instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::warn;

use crate::action::{Action, ActionFactory};
use crate::model::ResourceId;
use crate::reducer::Reducer;
use crate::resource::{ConfigError, ResourceConfig, ResourcePath};
use crate::state::{Entity, ResourceState};

/// The full state tree: one slice per mounted root config.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    slices: BTreeMap<String, ResourceState>,
}

impl StoreState {
    /// The slice for a root resource.
    pub fn slice(&self, root: &str) -> Option<&ResourceState> {
        self.slices.get(root)
    }

    /// One entity of a root resource.
    pub fn entity(&self, root: &str, id: &ResourceId) -> Option<&Entity> {
        self.slice(root)?.entity(id)
    }

    /// Resolve a nested slice by path and ancestor id chain, e.g. the
    /// IPs of instance 42: `slice_at(instances.ips, [42])`.
    ///
    /// Returns `None` when any link of the chain is missing.
    pub fn slice_at(
        &self,
        path: &ResourcePath,
        ancestors: &[ResourceId],
    ) -> Option<&ResourceState> {
        let mut slice = self.slice(path.root_name())?;
        for (segment, owner_id) in path.segments().iter().skip(1).zip(ancestors) {
            slice = slice.entity(owner_id)?.child(segment)?;
        }
        // Chain shorter than the path means the address is incomplete.
        if ancestors.len() == path.depth() {
            Some(slice)
        } else {
            None
        }
    }
}

struct Mounted {
    config: Arc<ResourceConfig>,
    reducer: Reducer,
}

/// Normalized state container for a set of resource trees.
pub struct Store {
    roots: BTreeMap<String, Mounted>,
    state: watch::Sender<Arc<StoreState>>,
}

impl Store {
    /// Mount one slice per root config. Fails if two roots share a name.
    pub fn new(configs: impl IntoIterator<Item = ResourceConfig>) -> Result<Self, ConfigError> {
        let mut roots = BTreeMap::new();
        let mut slices = BTreeMap::new();

        for config in configs {
            let name = config.name().to_owned();
            if roots.contains_key(&name) {
                return Err(ConfigError::DuplicateRoot { name });
            }
            slices.insert(name.clone(), Reducer::initial_state());
            let config = Arc::new(config);
            roots.insert(
                name,
                Mounted {
                    reducer: Reducer::new(Arc::clone(&config)),
                    config,
                },
            );
        }

        let (state, _) = watch::channel(Arc::new(StoreState { slices }));
        Ok(Self { roots, state })
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Apply one action, stamped with the current time.
    pub fn dispatch(&self, action: &Action) {
        self.dispatch_at(action, Utc::now());
    }

    /// Apply one action with an explicit timestamp. Exposed for tests
    /// that need deterministic `last_updated` values.
    pub fn dispatch_at(&self, action: &Action, now: DateTime<Utc>) {
        let root = action.path.root_name();
        let Some(mounted) = self.roots.get(root) else {
            warn!(action = %action.describe(), "no slice mounted for action, dropping");
            return;
        };

        // `send_modify` updates unconditionally, even with zero receivers,
        // and makes the reduce-and-publish step atomic for readers.
        self.state.send_modify(|shared| {
            let tree = Arc::make_mut(shared);
            if let Some(slice) = tree.slices.get_mut(root) {
                let previous = std::mem::take(slice);
                *slice = mounted.reducer.reduce(previous, action, now);
            }
        });
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Cheap point-in-time snapshot of the whole tree.
    pub fn snapshot(&self) -> Arc<StoreState> {
        self.state.borrow().clone()
    }

    /// Subscribe to snapshot changes; fires on every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<Arc<StoreState>> {
        self.state.subscribe()
    }

    /// Action factory for a mounted root.
    pub fn actions(&self, root: &str) -> Option<ActionFactory> {
        self.roots
            .get(root)
            .map(|m| ActionFactory::new(Arc::clone(&m.config)))
    }

    /// Config of a mounted root.
    pub fn config(&self, root: &str) -> Option<&Arc<ResourceConfig>> {
        self.roots.get(root).map(|m| &m.config)
    }

    /// Names of every mounted root, in stable order.
    pub fn mounted(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }
}
