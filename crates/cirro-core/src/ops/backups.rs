// Instance backup operations.

use cirro_api::ApiClient;
use serde_json::{Value, json};

use crate::error::CoreError;
use crate::model::ResourceId;
use crate::ops::ResourceOps;
use crate::store::Store;

/// Take a manual snapshot of an instance, then refresh its backup list.
///
/// Two dependent calls, strictly sequential: the list re-fetch is only
/// issued after the snapshot POST succeeds. The returned payload is the
/// snapshot as the API reported it at creation time; the follow-up fetch
/// brings the slice in line with the server's view (count, ordering,
/// status of older backups).
pub async fn take_backup(
    api: &ApiClient,
    store: &Store,
    instance_id: &ResourceId,
    label: Option<&str>,
) -> Result<Value, CoreError> {
    let backups = ResourceOps::new(api, store, "instances")?.subresource("backups")?;
    let ancestors = [instance_id.clone()];

    let body = match label {
        Some(label) => json!({ "label": label }),
        None => json!({}),
    };

    let snapshot = backups.create(&body, &ancestors).await?;
    backups.fetch_page(1, &ancestors).await?;

    Ok(snapshot)
}
