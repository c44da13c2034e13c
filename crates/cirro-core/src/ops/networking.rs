// Networking operations: batched IP assignment and reverse DNS.

use std::collections::{BTreeMap, BTreeSet};

use cirro_api::{ApiClient, Page};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::CoreError;
use crate::model::ResourceId;
use crate::ops::ResourceOps;
use crate::state::Fields;
use crate::store::Store;

/// One entry of a batched IP assignment: move `address` to `instance_id`.
#[derive(Debug, Clone, Serialize)]
pub struct IpAssignment {
    pub address: String,
    pub instance_id: ResourceId,
}

/// Reassign public IPv4 addresses between instances in one region.
///
/// The API accepts the whole batch as a single mutation, so the network
/// step is one POST -- never concurrent mutating calls against the same
/// instance. Local state is prepared *before* that call: each affected
/// instance's current IP slice is copied out of one store snapshot, the
/// addresses are moved between the copies, and only the resulting local
/// dispatches fan out afterwards.
pub async fn assign_ips(
    api: &ApiClient,
    store: &Store,
    region: &str,
    assignments: &[IpAssignment],
) -> Result<(), CoreError> {
    // One snapshot for the whole computation; racing refreshes cannot
    // tear the per-instance copies apart.
    let snapshot = store.snapshot();

    let address_ids: Vec<ResourceId> = assignments
        .iter()
        .map(|a| ResourceId::from(a.address.as_str()))
        .collect();

    // Affected instances: every assignment target, plus every current
    // owner of an address being moved.
    let mut affected: BTreeSet<ResourceId> = assignments
        .iter()
        .map(|a| a.instance_id.clone())
        .collect();
    let mut copies: BTreeMap<ResourceId, BTreeMap<ResourceId, Fields>> = BTreeMap::new();

    if let Some(instances) = snapshot.slice("instances") {
        for (instance_id, entity) in &instances.items_by_id {
            let Some(ip_slice) = entity.child("ips") else {
                continue;
            };
            if address_ids.iter().any(|a| ip_slice.entity(a).is_some()) {
                affected.insert(instance_id.clone());
            }
        }
        for instance_id in &affected {
            let copy = instances
                .entity(instance_id)
                .and_then(|e| e.child("ips"))
                .map(|slice| {
                    slice
                        .items_by_id
                        .iter()
                        .map(|(id, entity)| (id.clone(), entity.fields.clone()))
                        .collect()
                })
                .unwrap_or_default();
            copies.insert(instance_id.clone(), copy);
        }
    }

    // The single batched mutation.
    let body = json!({ "region": region, "assignments": assignments });
    api.post_no_response("networking/ipv4/assign", &body).await?;

    // Move the addresses between the local copies.
    for (assignment, address_id) in assignments.iter().zip(&address_ids) {
        let mut moved: Option<Fields> = None;
        for copy in copies.values_mut() {
            if let Some(fields) = copy.remove(address_id) {
                moved = Some(fields);
                break;
            }
        }

        let mut fields = moved.unwrap_or_else(|| {
            debug!(address = %assignment.address, "assigned address not in local state");
            let mut fields = Fields::new();
            fields.insert("address".into(), Value::String(assignment.address.clone()));
            fields
        });
        fields.insert(
            "instance_id".into(),
            serde_json::to_value(&assignment.instance_id).unwrap_or(Value::Null),
        );

        copies
            .entry(assignment.instance_id.clone())
            .or_default()
            .insert(address_id.clone(), fields);
    }

    // Fan out the local dispatches, one synthesized page per instance.
    let factory = store
        .actions("instances")
        .ok_or_else(|| CoreError::UnknownResource("instances".into()))?
        .subresource("ips")?;
    for (instance_id, copy) in copies {
        let data: Vec<Value> = copy.into_values().map(Value::Object).collect();
        let results = u64::try_from(data.len()).unwrap_or(u64::MAX);
        let page = Page {
            data,
            page: 1,
            pages: 1,
            results,
        };
        store.dispatch(&factory.many(page, std::slice::from_ref(&instance_id)));
    }

    Ok(())
}

/// Set the reverse-DNS record of one of an instance's addresses.
///
/// The PUT returns the updated IP object, which is merge-upserted into
/// the owning instance's IP slice.
pub async fn set_reverse_dns(
    api: &ApiClient,
    store: &Store,
    instance_id: &ResourceId,
    address: &str,
    rdns: Option<&str>,
) -> Result<Value, CoreError> {
    let ips = ResourceOps::new(api, store, "instances")?.subresource("ips")?;

    let body = json!({ "rdns": rdns });
    ips.update(
        &ResourceId::from(address),
        &body,
        std::slice::from_ref(instance_id),
    )
    .await
}
