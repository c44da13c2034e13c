// Operation tests: generic CRUD against a mock API, verifying both the
// HTTP traffic and the store mutations each operation dispatches.

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cirro_api::ApiClient;
use cirro_core::{
    CoreError, IpAssignment, ResourceId, ResourceOps, Store, assign_ips, catalog,
    set_reverse_dns, take_backup,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient, Store) {
    let server = MockServer::start().await;
    let api = ApiClient::from_reqwest(&server.uri(), reqwest::Client::new())
        .expect("client builds");
    let store = Store::new(catalog::console_resources().expect("catalog builds"))
        .expect("store mounts");
    (server, api, store)
}

fn page_body(data: Vec<Value>, results: u64) -> Value {
    json!({ "data": data, "page": 1, "pages": 1, "results": results })
}

/// Seed an instance entity so sub-resource dispatches have a parent.
fn seed_instance(store: &Store, id: i64) {
    let actions = store.actions("instances").expect("instances mounted");
    store.dispatch(&actions.one(json!({"id": id, "label": format!("i-{id}")}), &[]));
}

// ── Collection fetches ──────────────────────────────────────────────

#[tokio::test]
async fn fetch_page_populates_slice() {
    let (server, api, store) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v4/instances"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            vec![json!({"id": 1, "label": "web-1"}), json!({"id": 2, "label": "web-2"})],
            2,
        )))
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "instances").expect("ops");
    let envelope = ops.fetch_page(1, &[]).await.expect("fetch succeeds");
    assert_eq!(envelope.results, 2);

    let snap = store.snapshot();
    let slice = snap.slice("instances").expect("slice mounted");
    assert_eq!(slice.len(), 2);
    assert!(!slice.loading);
    assert!(slice.error.is_none());
    assert_eq!(slice.results_count, 2);
}

#[tokio::test]
async fn fetch_page_failure_marks_slice() {
    let (server, api, store) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v4/instances"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "instances").expect("ops");
    let result = ops.fetch_page(1, &[]).await;
    assert!(result.is_err());

    let snap = store.snapshot();
    let slice = snap.slice("instances").expect("slice mounted");
    assert!(!slice.loading);
    assert!(slice.error.is_some());
    assert!(slice.is_empty());
}

#[tokio::test]
async fn fetch_page_sends_slice_filter() {
    let (server, api, store) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v4/instances"))
        .and(header("X-Filter", r#"{"region":"us-east"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            vec![json!({"id": 1, "region": "us-east"})],
            1,
        )))
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "instances").expect("ops");
    ops.set_filter(Some(json!({"region": "us-east"})), &[]);
    ops.fetch_page(1, &[]).await.expect("filtered fetch succeeds");

    let snap = store.snapshot();
    assert_eq!(snap.slice("instances").expect("slice").len(), 1);
}

#[tokio::test]
async fn fetch_all_walks_pages_sequentially() {
    let (server, api, store) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v4/volumes"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1}, {"id": 2}], "page": 1, "pages": 2, "results": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/volumes"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 3}], "page": 2, "pages": 2, "results": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "volumes").expect("ops");
    ops.fetch_all(&[]).await.expect("fetch_all succeeds");

    let snap = store.snapshot();
    let slice = snap.slice("volumes").expect("slice");
    // All three entities cached; order reflects the last page only.
    assert_eq!(slice.len(), 3);
    assert_eq!(slice.item_order, vec![ResourceId::Int(3)]);
    assert_eq!(slice.results_count, 3);
}

// ── Sub-resource fetches ────────────────────────────────────────────

#[tokio::test]
async fn subresource_fetch_lands_under_parent() {
    let (server, api, store) = setup().await;
    seed_instance(&store, 42);

    Mock::given(method("GET"))
        .and(path("/v4/instances/42/ips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            vec![json!({"address": "203.0.113.10", "rdns": null})],
            1,
        )))
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "instances")
        .and_then(|o| o.subresource("ips"))
        .expect("ips ops");
    ops.fetch_page(1, &[ResourceId::Int(42)]).await.expect("fetch succeeds");

    let snap = store.snapshot();
    let ip = snap
        .entity("instances", &ResourceId::Int(42))
        .and_then(|e| e.child("ips"))
        .and_then(|s| s.entity(&ResourceId::Str("203.0.113.10".into())))
        .expect("ip stored under parent");
    assert_eq!(ip.get("rdns"), Some(&json!(null)));
}

// ── Single-entity CRUD ──────────────────────────────────────────────

#[tokio::test]
async fn create_dispatches_returned_entity() {
    let (server, api, store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v4/volumes"))
        .and(body_json(json!({"label": "data", "size": 50})))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": 7, "label": "data", "size": 50, "status": "creating"}),
        ))
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "volumes").expect("ops");
    let created = ops
        .create(&json!({"label": "data", "size": 50}), &[])
        .await
        .expect("create succeeds");
    assert_eq!(created["id"], 7);

    let snap = store.snapshot();
    assert!(snap.entity("volumes", &ResourceId::Int(7)).is_some());
}

#[tokio::test]
async fn update_merges_partial_response() {
    let (server, api, store) = setup().await;

    let actions = store.actions("volumes").expect("volumes mounted");
    store.dispatch(&actions.one(json!({"id": 7, "label": "data", "size": 50}), &[]));

    // The API echoes only what changed.
    Mock::given(method("PUT"))
        .and(path("/v4/volumes/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 7, "label": "scratch"})),
        )
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "volumes").expect("ops");
    ops.update(&ResourceId::Int(7), &json!({"label": "scratch"}), &[])
        .await
        .expect("update succeeds");

    let snap = store.snapshot();
    let entity = snap.entity("volumes", &ResourceId::Int(7)).expect("entity");
    assert_eq!(entity.get("label"), Some(&json!("scratch")));
    assert_eq!(entity.get("size"), Some(&json!(50)));
}

#[tokio::test]
async fn delete_updates_store_only_on_success() {
    let (server, api, store) = setup().await;

    let actions = store.actions("volumes").expect("volumes mounted");
    store.dispatch(&actions.one(json!({"id": 7}), &[]));

    Mock::given(method("DELETE"))
        .and(path("/v4/volumes/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v4/volumes/8"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "volumes").expect("ops");

    ops.delete(&ResourceId::Int(7), &[]).await.expect("delete succeeds");
    assert!(
        store
            .snapshot()
            .entity("volumes", &ResourceId::Int(7))
            .is_none()
    );

    // A failed DELETE must not touch local state.
    store.dispatch(&actions.one(json!({"id": 8}), &[]));
    let result = ops.delete(&ResourceId::Int(8), &[]).await;
    assert!(result.is_err());
    assert!(
        store
            .snapshot()
            .entity("volumes", &ResourceId::Int(8))
            .is_some()
    );
}

#[tokio::test]
async fn unsupported_operation_fails_without_network() {
    let (_server, api, store) = setup().await;

    // No mock mounted: a network call would error differently.
    let ops = ResourceOps::new(&api, &store, "instances")
        .and_then(|o| o.subresource("ips"))
        .expect("ips ops");

    let result = ops.delete(&ResourceId::from("203.0.113.10"), &[ResourceId::Int(42)]).await;

    assert!(matches!(result, Err(CoreError::Unsupported { .. })));
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn poll_until_converges() {
    let (server, api, store) = setup().await;
    seed_instance(&store, 7);

    Mock::given(method("GET"))
        .and(path("/v4/instances/7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 7, "status": "provisioning"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/instances/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 7, "status": "running"})),
        )
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "instances").expect("ops");
    let final_payload = ops
        .poll_until(
            &ResourceId::Int(7),
            &[],
            |payload| payload["status"] == "running",
            Duration::from_millis(1),
            5,
        )
        .await
        .expect("poll converges");

    assert_eq!(final_payload["status"], "running");
    let snap = store.snapshot();
    assert_eq!(
        snap.entity("instances", &ResourceId::Int(7))
            .and_then(|e| e.get("status")),
        Some(&json!("running"))
    );
}

#[tokio::test]
async fn poll_until_exhausts_budget() {
    let (server, api, store) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v4/instances/7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 7, "status": "provisioning"})),
        )
        .mount(&server)
        .await;

    let ops = ResourceOps::new(&api, &store, "instances").expect("ops");
    let result = ops
        .poll_until(
            &ResourceId::Int(7),
            &[],
            |payload| payload["status"] == "running",
            Duration::from_millis(1),
            2,
        )
        .await;

    assert!(matches!(
        result,
        Err(CoreError::PollBudgetExhausted { attempts: 2, .. })
    ));
}

// ── Ad-hoc operations ───────────────────────────────────────────────

#[tokio::test]
async fn take_backup_posts_then_refreshes_list() {
    let (server, api, store) = setup().await;
    seed_instance(&store, 42);

    Mock::given(method("POST"))
        .and(path("/v4/instances/42/backups"))
        .and(body_json(json!({"label": "pre-upgrade"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": 101, "label": "pre-upgrade", "status": "pending"}),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/instances/42/backups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            vec![json!({"id": 101, "label": "pre-upgrade", "status": "pending"})],
            1,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = take_backup(&api, &store, &ResourceId::Int(42), Some("pre-upgrade"))
        .await
        .expect("backup succeeds");
    assert_eq!(snapshot["id"], 101);

    let snap = store.snapshot();
    let backups = snap
        .entity("instances", &ResourceId::Int(42))
        .and_then(|e| e.child("backups"))
        .expect("backup slice");
    assert_eq!(backups.results_count, 1);
    assert!(backups.entity(&ResourceId::Int(101)).is_some());
}

#[tokio::test]
async fn take_backup_stops_after_failed_post() {
    let (server, api, store) = setup().await;
    seed_instance(&store, 42);

    Mock::given(method("POST"))
        .and(path("/v4/instances/42/backups"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"reason": "Backups are not enabled", "field": null}]
        })))
        .mount(&server)
        .await;
    // The list endpoint must never be hit when the POST fails.
    Mock::given(method("GET"))
        .and(path("/v4/instances/42/backups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(vec![], 0)))
        .expect(0)
        .mount(&server)
        .await;

    let result = take_backup(&api, &store, &ResourceId::Int(42), None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn assign_ips_moves_addresses_locally() {
    let (server, api, store) = setup().await;
    seed_instance(&store, 1);
    seed_instance(&store, 2);

    let ips = store
        .actions("instances")
        .and_then(|a| a.subresource("ips").ok())
        .expect("ips actions");
    store.dispatch(&ips.many(
        cirro_api::Page {
            data: vec![json!({"address": "203.0.113.10", "instance_id": 1})],
            page: 1,
            pages: 1,
            results: 1,
        },
        &[ResourceId::Int(1)],
    ));

    Mock::given(method("POST"))
        .and(path("/v4/networking/ipv4/assign"))
        .and(body_json(json!({
            "region": "us-east",
            "assignments": [{"address": "203.0.113.10", "instance_id": 2}]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assign_ips(
        &api,
        &store,
        "us-east",
        &[IpAssignment {
            address: "203.0.113.10".into(),
            instance_id: ResourceId::Int(2),
        }],
    )
    .await
    .expect("assignment succeeds");

    let snap = store.snapshot();
    let donor_ips = snap
        .entity("instances", &ResourceId::Int(1))
        .and_then(|e| e.child("ips"))
        .expect("donor slice");
    assert!(donor_ips.is_empty());

    let receiver_ip = snap
        .entity("instances", &ResourceId::Int(2))
        .and_then(|e| e.child("ips"))
        .and_then(|s| s.entity(&ResourceId::Str("203.0.113.10".into())))
        .expect("address moved");
    assert_eq!(receiver_ip.get("instance_id"), Some(&json!(2)));
}

#[tokio::test]
async fn set_reverse_dns_upserts_ip() {
    let (server, api, store) = setup().await;
    seed_instance(&store, 42);

    Mock::given(method("PUT"))
        .and(path("/v4/instances/42/ips/203.0.113.10"))
        .and(body_json(json!({"rdns": "web.example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"address": "203.0.113.10", "rdns": "web.example.com"}),
        ))
        .mount(&server)
        .await;

    let updated = set_reverse_dns(
        &api,
        &store,
        &ResourceId::Int(42),
        "203.0.113.10",
        Some("web.example.com"),
    )
    .await
    .expect("rdns update succeeds");
    assert_eq!(updated["rdns"], "web.example.com");

    let snap = store.snapshot();
    let ip = snap
        .entity("instances", &ResourceId::Int(42))
        .and_then(|e| e.child("ips"))
        .and_then(|s| s.entity(&ResourceId::Str("203.0.113.10".into())))
        .expect("ip upserted");
    assert_eq!(ip.get("rdns"), Some(&json!("web.example.com")));
}
