//! Round trip against a live MongoDB deployment.
//!
//! Skipped unless `MORTGAGE_TEST_DB_URI` points at a disposable server. Each run uses its own
//! collection and drops it afterwards.

use std::time::Duration;

use mortgage_intake::applications::{ApplicationId, ApplicationStore, MongoApplicationCollection};
use mortgage_intake::config::{StoreBackend, StoreConfig};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn mongo_collection_round_trip() {
    let Ok(uri) = std::env::var("MORTGAGE_TEST_DB_URI") else {
        eprintln!("MORTGAGE_TEST_DB_URI not set; skipping mongo round trip");
        return;
    };

    let config = StoreConfig {
        backend: StoreBackend::Mongo,
        uri: Some(uri.clone()),
        database: "mortgage_intake_test".to_string(),
        collection: format!("applications_{}", std::process::id()),
        timeout: Some(Duration::from_secs(5)),
        index_submitted_at: true,
    };

    let client = mongodb::Client::with_uri_str(&uri).await.expect("client");
    let collection = MongoApplicationCollection::connect(&uri, &config)
        .await
        .expect("connect");
    let store = ApplicationStore::new(Arc::new(collection)).with_timeout(Duration::from_secs(5));

    let payload = json!({
        "username": "frank",
        "credit_score": 740,
        "annual_income": 120000,
        "property_type": "townhouse",
        "budget": 60000,
        "home_value": 410000,
    });
    let id = store.create(&payload).await.expect("create");
    assert!(matches!(
        store.create(&payload).await,
        Err(mortgage_intake::applications::ApplicationStoreError::DuplicateKey { .. })
    ));

    let fields = json!({ "is_veteran": true, "loan_officer": "dana" });
    let fields = fields.as_object().expect("object");
    assert!(store.update(&id, fields).await.expect("update"));
    assert!(!store.update(&id, fields).await.expect("repeat update"));
    assert!(!store
        .update(&ApplicationId::from("nobody"), fields)
        .await
        .expect("missing update"));

    let stored = store.get(&id).await.expect("get").expect("present");
    assert!(stored.is_veteran);
    assert_eq!(stored.extra.get("loan_officer"), Some(&json!("dana")));

    assert!(store.delete(&id).await.expect("delete"));
    assert!(!store.delete(&id).await.expect("second delete"));

    client
        .database(&config.database)
        .collection::<mongodb::bson::Document>(&config.collection)
        .drop()
        .await
        .expect("drop test collection");
}
