// cirro-core: Normalized resource state and operation layer between
// cirro-api and consumers (console frontends, automation).

pub mod action;
pub mod catalog;
pub mod error;
pub mod model;
pub mod ops;
pub mod reducer;
pub mod resource;
pub mod state;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{Action, ActionFactory, ActionKind};
pub use error::CoreError;
pub use model::ResourceId;
pub use ops::{IpAssignment, ResourceOps, assign_ips, set_reverse_dns, take_backup};
pub use reducer::Reducer;
pub use resource::{
    ALL_OPERATIONS, ConfigError, Operation, ResourceConfig, ResourceConfigBuilder, ResourcePath,
};
pub use state::{Entity, Fields, ResourceState};
pub use store::{Store, StoreState};

// Re-export the API surface operations are built on, so consumers can
// depend on one crate.
pub use cirro_api::{ApiClient, Page, TransportConfig};
