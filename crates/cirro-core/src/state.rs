// ── Normalized client-side state ──
//
// One ResourceState per config node, one Entity per primary-key value.
// Entities keep their API payload (`fields`) and their attached
// sub-resource slices (`children`) in separate maps: a payload merge can
// never clobber previously loaded child data, because the two never share
// a namespace.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::ResourceId;
use crate::resource::ResourceConfig;

/// Opaque API payload of one entity.
pub type Fields = Map<String, Value>;

/// One entity: its API fields plus locally attached sub-resource slices,
/// keyed by the child config's name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub fields: Fields,
    pub children: BTreeMap<String, ResourceState>,
}

impl Entity {
    /// Build a fresh entity from an API payload, initializing an empty
    /// slice for every sub-resource the config declares.
    pub fn new(fields: Fields, config: &ResourceConfig) -> Self {
        let children = config
            .subresources()
            .map(|(name, _)| (name.to_owned(), ResourceState::default()))
            .collect();
        Self { fields, children }
    }

    /// Read one API field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The entity's normalized id under the given primary key, if present
    /// and usable.
    pub fn id(&self, primary_key: &str) -> Option<ResourceId> {
        self.fields.get(primary_key).and_then(ResourceId::from_value)
    }

    /// Merge an incoming payload into this entity: incoming fields win,
    /// fields absent from the payload survive. Children are untouched.
    pub fn merge_fields(&mut self, incoming: Fields) {
        for (key, value) in incoming {
            self.fields.insert(key, value);
        }
    }

    /// The attached slice for a sub-resource, if any data has been stored.
    pub fn child(&self, name: &str) -> Option<&ResourceState> {
        self.children.get(name)
    }
}

/// The slice of state managed for one config node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceState {
    /// Entities keyed by normalized primary-key value.
    pub items_by_id: HashMap<ResourceId, Entity>,
    /// Id order of the most recently fetched page. Not a total order
    /// across pages.
    pub item_order: Vec<ResourceId>,
    /// Total results the API reported for the current filter.
    pub results_count: u64,
    /// True while a collection fetch is in flight.
    pub loading: bool,
    /// Timestamp of the last successful mutation to this slice.
    pub last_updated: Option<DateTime<Utc>>,
    /// Last collection-fetch failure, cleared when a fetch starts.
    pub error: Option<String>,
    /// Server-side filter applied to collection fetches, sent as the
    /// `X-Filter` header.
    pub filter: Option<Value>,
}

impl ResourceState {
    pub fn entity(&self, id: &ResourceId) -> Option<&Entity> {
        self.items_by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.items_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items_by_id.is_empty()
    }

    /// Entities in `item_order`, skipping ids whose entity has been
    /// deleted since the page was fetched.
    pub fn ordered(&self) -> impl Iterator<Item = (&ResourceId, &Entity)> {
        self.item_order
            .iter()
            .filter_map(|id| self.items_by_id.get(id).map(|e| (id, e)))
    }
}
