// ── Declarative resource configuration ──
//
// A ResourceConfig describes one REST-backed collection: its name (also
// its URL segment), primary key, supported operations, and nested
// sub-resources. Everything else in this crate -- actions, reducers,
// endpoint paths, operations -- is derived from this tree.
//
// Configs are finite trees by construction (children are owned values),
// and validation happens once, in `build()`. A config that survives
// construction can never produce a reducer that misroutes at runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

use crate::model::ResourceId;

// ── Operations ──────────────────────────────────────────────────────

/// The REST operations a resource can support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    FetchOne,
    FetchMany,
    Create,
    Update,
    Delete,
}

/// All five operations; the common case for top-level resources.
pub const ALL_OPERATIONS: [Operation; 5] = [
    Operation::FetchOne,
    Operation::FetchMany,
    Operation::Create,
    Operation::Update,
    Operation::Delete,
];

// ── Errors ──────────────────────────────────────────────────────────

/// Malformed resource configuration, detected at construction time.
///
/// Fatal by design: a config that fails here never yields an action
/// factory or reducer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("resource name must be a non-empty lowercase URL segment, got {name:?}")]
    InvalidName { name: String },

    #[error("primary key for resource '{resource}' must be non-empty")]
    EmptyPrimaryKey { resource: String },

    #[error("resource '{resource}' must support at least one operation")]
    NoOperations { resource: String },

    #[error("duplicate subresource '{child}' under resource '{resource}'")]
    DuplicateSubresource { resource: String, child: String },

    #[error("unknown subresource '{child}' under resource '{resource}'")]
    UnknownSubresource { resource: String, child: String },

    #[error("wrong ancestor id count for '{path}': expected {expected}, got {got}")]
    ArityMismatch {
        path: String,
        expected: usize,
        got: usize,
    },

    #[error("a resource named '{name}' is already mounted in this store")]
    DuplicateRoot { name: String },
}

// ── Resource paths ──────────────────────────────────────────────────

/// The position of a config node in its tree, as the chain of resource
/// names from the root (e.g. `nodebalancers.configs.nodes`).
///
/// Every action carries one of these as its routing tag; reducers match
/// on it instead of string-typed action names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath(Vec<String>);

impl ResourcePath {
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Extend the path with a child resource name.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The root resource name; the store routes on this.
    pub fn root_name(&self) -> &str {
        // A path always has at least one segment by construction.
        self.0.first().map_or("", String::as_str)
    }

    /// Number of ancestors a node at this path has (root = 0). This is
    /// also the ancestor-id count every action targeting the node must
    /// carry.
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

// ── ResourceConfig ──────────────────────────────────────────────────

/// Declarative description of one REST-backed collection and its nested
/// sub-collections. Pure data; construct with [`ResourceConfig::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    name: String,
    primary_key: String,
    operations: BTreeSet<Operation>,
    subresources: BTreeMap<String, ResourceConfig>,
}

impl ResourceConfig {
    pub fn builder(name: impl Into<String>) -> ResourceConfigBuilder {
        ResourceConfigBuilder {
            name: name.into(),
            primary_key: "id".into(),
            operations: BTreeSet::new(),
            subresources: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn supports(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn subresource(&self, name: &str) -> Option<&ResourceConfig> {
        self.subresources.get(name)
    }

    pub fn subresources(&self) -> impl Iterator<Item = (&str, &ResourceConfig)> {
        self.subresources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve the config node addressed by `path`, which must start at
    /// this (root) config.
    pub fn node_at(&self, path: &ResourcePath) -> Result<&ResourceConfig, ConfigError> {
        let mut segments = path.segments().iter();
        match segments.next() {
            Some(first) if *first == self.name => {}
            other => {
                return Err(ConfigError::UnknownSubresource {
                    resource: self.name.clone(),
                    child: other.cloned().unwrap_or_default(),
                });
            }
        }

        let mut node = self;
        for segment in segments {
            node = node
                .subresource(segment)
                .ok_or_else(|| ConfigError::UnknownSubresource {
                    resource: node.name.clone(),
                    child: segment.clone(),
                })?;
        }
        Ok(node)
    }

    /// Endpoint path of the collection at `path`, addressed by the full
    /// ancestor id chain: `instances/42/ips`, `nodebalancers/7/configs/3/nodes`.
    ///
    /// The chain length must equal the node's depth -- every ancestor,
    /// not just the immediate parent, participates in the address.
    pub fn collection_endpoint(
        &self,
        path: &ResourcePath,
        ancestors: &[ResourceId],
    ) -> Result<String, ConfigError> {
        self.node_at(path)?;

        if ancestors.len() != path.depth() {
            return Err(ConfigError::ArityMismatch {
                path: path.to_string(),
                expected: path.depth(),
                got: ancestors.len(),
            });
        }

        let mut endpoint = String::new();
        for (i, segment) in path.segments().iter().enumerate() {
            if i > 0 {
                endpoint.push('/');
            }
            endpoint.push_str(segment);
            if let Some(id) = ancestors.get(i) {
                endpoint.push('/');
                endpoint.push_str(&id.to_string());
            }
        }
        Ok(endpoint)
    }

    /// Endpoint path of a single entity: the collection endpoint plus the
    /// entity's own id.
    pub fn item_endpoint(
        &self,
        path: &ResourcePath,
        ancestors: &[ResourceId],
        id: &ResourceId,
    ) -> Result<String, ConfigError> {
        let mut endpoint = self.collection_endpoint(path, ancestors)?;
        endpoint.push('/');
        endpoint.push_str(&id.to_string());
        Ok(endpoint)
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Builder for [`ResourceConfig`]. All validation happens in [`build`],
/// so a malformed config fails fast instead of misbehaving later.
///
/// [`build`]: ResourceConfigBuilder::build
pub struct ResourceConfigBuilder {
    name: String,
    primary_key: String,
    operations: BTreeSet<Operation>,
    subresources: Vec<ResourceConfig>,
}

impl ResourceConfigBuilder {
    /// Override the primary-key field name (default `"id"`).
    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    pub fn operations(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.operations.extend(ops);
        self
    }

    /// Attach an already-built child config. Children are keyed by their
    /// own name; duplicates are rejected at build time.
    pub fn subresource(mut self, child: ResourceConfig) -> Self {
        self.subresources.push(child);
        self
    }

    pub fn build(self) -> Result<ResourceConfig, ConfigError> {
        let name = self.name;

        let valid_segment = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid_segment {
            return Err(ConfigError::InvalidName { name });
        }

        if self.primary_key.is_empty() {
            return Err(ConfigError::EmptyPrimaryKey { resource: name });
        }

        if self.operations.is_empty() {
            return Err(ConfigError::NoOperations { resource: name });
        }

        let mut subresources = BTreeMap::new();
        for child in self.subresources {
            let child_name = child.name.clone();
            if subresources.insert(child_name.clone(), child).is_some() {
                return Err(ConfigError::DuplicateSubresource {
                    resource: name,
                    child: child_name,
                });
            }
        }

        Ok(ResourceConfig {
            name,
            primary_key: self.primary_key,
            operations: self.operations,
            subresources,
        })
    }
}
