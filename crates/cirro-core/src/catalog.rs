// ── Console resource catalog ──
//
// The well-known resource trees of the provider API, declared once with
// the config schema. Consumers mount these in a Store; anything not
// listed here can be declared ad hoc with `ResourceConfig::builder`.

use crate::resource::{ALL_OPERATIONS, ConfigError, Operation, ResourceConfig};

/// Compute instances, with backups, public IPs, boot configs, and disks
/// attached as sub-resources.
pub fn instances() -> Result<ResourceConfig, ConfigError> {
    let backups = ResourceConfig::builder("backups")
        .operations([Operation::FetchOne, Operation::FetchMany, Operation::Create])
        .build()?;
    // IPs are keyed by address, not a numeric id.
    let ips = ResourceConfig::builder("ips")
        .primary_key("address")
        .operations([Operation::FetchMany, Operation::Update])
        .build()?;
    let configs = ResourceConfig::builder("configs")
        .operations(ALL_OPERATIONS)
        .build()?;
    let disks = ResourceConfig::builder("disks")
        .operations(ALL_OPERATIONS)
        .build()?;

    ResourceConfig::builder("instances")
        .operations(ALL_OPERATIONS)
        .subresource(backups)
        .subresource(ips)
        .subresource(configs)
        .subresource(disks)
        .build()
}

/// Block-storage volumes.
pub fn volumes() -> Result<ResourceConfig, ConfigError> {
    ResourceConfig::builder("volumes")
        .operations(ALL_OPERATIONS)
        .build()
}

/// DNS domains and their records.
pub fn domains() -> Result<ResourceConfig, ConfigError> {
    let records = ResourceConfig::builder("records")
        .operations(ALL_OPERATIONS)
        .build()?;

    ResourceConfig::builder("domains")
        .operations(ALL_OPERATIONS)
        .subresource(records)
        .build()
}

/// Node balancers, nested two levels: configs, and the nodes of each
/// config.
pub fn nodebalancers() -> Result<ResourceConfig, ConfigError> {
    let nodes = ResourceConfig::builder("nodes")
        .operations(ALL_OPERATIONS)
        .build()?;
    let configs = ResourceConfig::builder("configs")
        .operations(ALL_OPERATIONS)
        .subresource(nodes)
        .build()?;

    ResourceConfig::builder("nodebalancers")
        .operations(ALL_OPERATIONS)
        .subresource(configs)
        .build()
}

/// Cloud firewalls and their rule sets.
pub fn firewalls() -> Result<ResourceConfig, ConfigError> {
    let rules = ResourceConfig::builder("rules")
        .operations([Operation::FetchMany, Operation::Update])
        .build()?;

    ResourceConfig::builder("firewalls")
        .operations(ALL_OPERATIONS)
        .subresource(rules)
        .build()
}

/// Every tree the console mounts by default.
pub fn console_resources() -> Result<Vec<ResourceConfig>, ConfigError> {
    Ok(vec![
        instances()?,
        volumes()?,
        domains()?,
        nodebalancers()?,
        firewalls()?,
    ])
}
