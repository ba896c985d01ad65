use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Map, Value};

use crate::applications::domain::{Application, ApplicationId};
use crate::applications::memory::InMemoryApplicationCollection;
use crate::applications::repository::{ApplicationCollection, CollectionError, UpdateOutcome};
use crate::applications::service::ApplicationStore;

pub(super) fn alice_payload() -> Value {
    json!({
        "username": "alice",
        "credit_score": 720,
        "annual_income": 85000,
        "property_type": "single_family",
        "budget": 70000,
        "home_value": 350000,
        "is_veteran": true,
        "is_first_time_buyer": true,
    })
}

pub(super) fn payload_for(username: &str) -> Value {
    let mut payload = alice_payload();
    payload["username"] = json!(username);
    payload
}

pub(super) fn without(payload: &Value, key: &str) -> Value {
    let mut trimmed = payload.clone();
    if let Some(object) = trimmed.as_object_mut() {
        object.remove(key);
    }
    trimmed
}

pub(super) fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub(super) fn memory_store() -> (
    ApplicationStore<InMemoryApplicationCollection>,
    Arc<InMemoryApplicationCollection>,
) {
    let collection = Arc::new(InMemoryApplicationCollection::default());
    (ApplicationStore::new(collection.clone()), collection)
}

pub(super) struct UnavailableCollection;

#[async_trait]
impl ApplicationCollection for UnavailableCollection {
    async fn insert_one(
        &self,
        _application: &Application,
        _timeout: Option<Duration>,
    ) -> Result<(), CollectionError> {
        Err(CollectionError::Unavailable("database offline".to_string()))
    }

    async fn find_one(
        &self,
        _id: &ApplicationId,
        _timeout: Option<Duration>,
    ) -> Result<Option<Application>, CollectionError> {
        Err(CollectionError::Unavailable("database offline".to_string()))
    }

    async fn update_one(
        &self,
        _id: &ApplicationId,
        _fields: &Map<String, Value>,
        _timeout: Option<Duration>,
    ) -> Result<UpdateOutcome, CollectionError> {
        Err(CollectionError::Unavailable("database offline".to_string()))
    }

    async fn delete_one(
        &self,
        _id: &ApplicationId,
        timeout: Option<Duration>,
    ) -> Result<u64, CollectionError> {
        Err(CollectionError::TimedOut(
            timeout.unwrap_or(Duration::from_secs(5)),
        ))
    }
}

/// Wraps the in-memory collection and records the deadline passed to every call.
#[derive(Default)]
pub(super) struct RecordingCollection {
    inner: InMemoryApplicationCollection,
    calls: Mutex<Vec<(&'static str, Option<Duration>)>>,
}

impl RecordingCollection {
    pub(super) fn calls(&self) -> Vec<(&'static str, Option<Duration>)> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    fn record(&self, operation: &'static str, timeout: Option<Duration>) {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push((operation, timeout));
    }
}

#[async_trait]
impl ApplicationCollection for RecordingCollection {
    async fn insert_one(
        &self,
        application: &Application,
        timeout: Option<Duration>,
    ) -> Result<(), CollectionError> {
        self.record("insert_one", timeout);
        self.inner.insert_one(application, timeout).await
    }

    async fn find_one(
        &self,
        id: &ApplicationId,
        timeout: Option<Duration>,
    ) -> Result<Option<Application>, CollectionError> {
        self.record("find_one", timeout);
        self.inner.find_one(id, timeout).await
    }

    async fn update_one(
        &self,
        id: &ApplicationId,
        fields: &Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<UpdateOutcome, CollectionError> {
        self.record("update_one", timeout);
        self.inner.update_one(id, fields, timeout).await
    }

    async fn delete_one(
        &self,
        id: &ApplicationId,
        timeout: Option<Duration>,
    ) -> Result<u64, CollectionError> {
        self.record("delete_one", timeout);
        self.inner.delete_one(id, timeout).await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
