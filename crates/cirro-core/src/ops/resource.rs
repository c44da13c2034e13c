// Generic CRUD operations derived from a config node.
//
// Each call performs the HTTP request, then dispatches the generated
// action on success. Failure paths never reach the reducer except the
// explicit collection-fetch failure action -- a rejected call simply
// propagates to the caller.

use std::time::Duration;

use cirro_api::{ApiClient, Page};
use serde_json::Value;
use tracing::debug;

use crate::action::ActionFactory;
use crate::error::CoreError;
use crate::model::ResourceId;
use crate::resource::{Operation, ResourceConfig, ResourcePath};
use crate::store::Store;

/// CRUD surface for one config node, addressed by ancestor id chains.
///
/// Derive one per resource (or sub-resource via [`subresource`]) and keep
/// it around; it borrows the client and store, holding no state of its
/// own beyond the node's path.
///
/// [`subresource`]: ResourceOps::subresource
pub struct ResourceOps<'a> {
    api: &'a ApiClient,
    store: &'a Store,
    factory: ActionFactory,
}

impl<'a> ResourceOps<'a> {
    /// Operations for a root resource mounted in the store.
    pub fn new(api: &'a ApiClient, store: &'a Store, root: &str) -> Result<Self, CoreError> {
        let factory = store
            .actions(root)
            .ok_or_else(|| CoreError::UnknownResource(root.to_owned()))?;
        Ok(Self {
            api,
            store,
            factory,
        })
    }

    /// Operations for a child of this node. Every level of nesting adds
    /// one ancestor id to each call.
    pub fn subresource(&self, name: &str) -> Result<Self, CoreError> {
        Ok(Self {
            api: self.api,
            store: self.store,
            factory: self.factory.subresource(name)?,
        })
    }

    pub fn path(&self) -> &ResourcePath {
        self.factory.path()
    }

    fn root(&self) -> &ResourceConfig {
        self.factory.root_config()
    }

    /// Resolve this node's config, checking it declares the operation.
    fn require(&self, op: Operation) -> Result<&ResourceConfig, CoreError> {
        let node = self.root().node_at(self.path())?;
        if node.supports(op) {
            Ok(node)
        } else {
            Err(CoreError::Unsupported {
                operation: op,
                resource: node.name().to_owned(),
            })
        }
    }

    // ── Collection fetches ───────────────────────────────────────────

    /// Fetch one page (1-based) of the collection, applying the slice's
    /// current filter. Dispatches the loading, page, and failure actions.
    pub async fn fetch_page(
        &self,
        page: u32,
        ancestors: &[ResourceId],
    ) -> Result<Page<Value>, CoreError> {
        self.require(Operation::FetchMany)?;
        let endpoint = self.root().collection_endpoint(self.path(), ancestors)?;
        let filter = self
            .store
            .snapshot()
            .slice_at(self.path(), ancestors)
            .and_then(|slice| slice.filter.clone());

        self.store.dispatch(&self.factory.fetch_start(ancestors));

        match self.api.get_page(&endpoint, Some(page), filter.as_ref()).await {
            Ok(envelope) => {
                self.store
                    .dispatch(&self.factory.many(envelope.clone(), ancestors));
                Ok(envelope)
            }
            Err(e) => {
                self.store
                    .dispatch(&self.factory.fetch_failure(e.to_string(), ancestors));
                Err(e.into())
            }
        }
    }

    /// Fetch every page of the collection, strictly sequentially.
    ///
    /// If the server reports a different page count mid-walk (the
    /// collection changed under us), the cached slice is invalidated and
    /// the walk restarts from the first page, once.
    pub async fn fetch_all(&self, ancestors: &[ResourceId]) -> Result<(), CoreError> {
        let mut restarted = false;

        'restart: loop {
            let first = self.fetch_page(1, ancestors).await?;
            let pages = first.pages;

            for page in 2..=pages {
                let envelope = self.fetch_page(page, ancestors).await?;
                if envelope.pages != pages && !restarted {
                    debug!(
                        path = %self.path(),
                        "page count changed mid-walk, invalidating and restarting"
                    );
                    restarted = true;
                    self.store.dispatch(&self.factory.invalidate(ancestors));
                    continue 'restart;
                }
            }

            return Ok(());
        }
    }

    // ── Single-entity operations ─────────────────────────────────────

    /// Fetch one entity and upsert it into the slice.
    pub async fn fetch_one(
        &self,
        id: &ResourceId,
        ancestors: &[ResourceId],
    ) -> Result<Value, CoreError> {
        self.require(Operation::FetchOne)?;
        let endpoint = self.root().item_endpoint(self.path(), ancestors, id)?;

        let payload: Value = self.api.get(&endpoint).await?;
        self.store
            .dispatch(&self.factory.one(payload.clone(), ancestors));
        Ok(payload)
    }

    /// Create an entity; the API's response payload is upserted.
    pub async fn create(
        &self,
        body: &Value,
        ancestors: &[ResourceId],
    ) -> Result<Value, CoreError> {
        self.require(Operation::Create)?;
        let endpoint = self.root().collection_endpoint(self.path(), ancestors)?;

        let payload: Value = self.api.post(&endpoint, body).await?;
        self.store
            .dispatch(&self.factory.one(payload.clone(), ancestors));
        Ok(payload)
    }

    /// Update an entity; the API's response payload is merge-upserted,
    /// so fields the response omits survive locally.
    pub async fn update(
        &self,
        id: &ResourceId,
        body: &Value,
        ancestors: &[ResourceId],
    ) -> Result<Value, CoreError> {
        self.require(Operation::Update)?;
        let endpoint = self.root().item_endpoint(self.path(), ancestors, id)?;

        let payload: Value = self.api.put(&endpoint, body).await?;
        self.store
            .dispatch(&self.factory.one(payload.clone(), ancestors));
        Ok(payload)
    }

    /// Delete an entity. The local slice is only updated after the API
    /// accepts the deletion.
    pub async fn delete(&self, id: &ResourceId, ancestors: &[ResourceId]) -> Result<(), CoreError> {
        self.require(Operation::Delete)?;
        let endpoint = self.root().item_endpoint(self.path(), ancestors, id)?;

        self.api.delete(&endpoint).await?;
        self.store
            .dispatch(&self.factory.delete(id.clone(), ancestors));
        Ok(())
    }

    /// Re-fetch an entity until `accept` passes, dispatching each refresh
    /// so readers watch the entity converge. Sleeps `interval` between
    /// attempts and gives up after `max_attempts`.
    pub async fn poll_until(
        &self,
        id: &ResourceId,
        ancestors: &[ResourceId],
        accept: impl Fn(&Value) -> bool + Send + Sync,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<Value, CoreError> {
        let node = self.require(Operation::FetchOne)?;
        let resource = node.name().to_owned();

        for attempt in 1..=max_attempts {
            let payload = self.fetch_one(id, ancestors).await?;
            if accept(&payload) {
                return Ok(payload);
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(CoreError::PollBudgetExhausted {
            resource,
            id: id.clone(),
            attempts: max_attempts,
        })
    }

    // ── Filters ──────────────────────────────────────────────────────

    /// Replace the slice's server-side filter. Callers that change the
    /// filter should follow with [`invalidate`] so cached pages from the
    /// old filter do not linger.
    ///
    /// [`invalidate`]: ResourceOps::invalidate
    pub fn set_filter(&self, filter: Option<Value>, ancestors: &[ResourceId]) {
        self.store
            .dispatch(&self.factory.set_filter(filter, ancestors));
    }

    /// Drop the slice's cached entities, keeping its filter.
    pub fn invalidate(&self, ancestors: &[ResourceId]) {
        self.store.dispatch(&self.factory.invalidate(ancestors));
    }
}
