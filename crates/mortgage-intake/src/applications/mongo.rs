use std::future::IntoFuture;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, to_document, Document};
use mongodb::error::{Error as DriverError, ErrorKind, WriteFailure};
use mongodb::{Client, Collection, IndexModel};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::domain::{Application, ApplicationId};
use super::repository::{ApplicationCollection, CollectionError, UpdateOutcome};
use super::schema::field;
use crate::config::StoreConfig;

/// Server error code for unique index violations, including duplicate `_id`.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Collection adapter backed by the MongoDB driver.
///
/// Applications are stored with the username as `_id`, so the server's primary key index is
/// the uniqueness constraint for identifiers.
#[derive(Debug, Clone)]
pub struct MongoApplicationCollection {
    collection: Collection<Application>,
}

impl MongoApplicationCollection {
    /// Open a client for `uri` and bind the configured database and collection.
    ///
    /// When `index_submitted_at` is set the single secondary index on `submitted_at` is
    /// created; the call is idempotent on the server.
    pub async fn connect(uri: &str, config: &StoreConfig) -> Result<Self, CollectionError> {
        let client = bounded(config.timeout, Client::with_uri_str(uri)).await?;
        let collection = client
            .database(&config.database)
            .collection::<Application>(&config.collection);

        let store = Self { collection };
        if config.index_submitted_at {
            store.ensure_submitted_at_index(config.timeout).await?;
        }

        info!(
            database = %config.database,
            collection = %config.collection,
            "mongo application collection bound"
        );
        Ok(store)
    }

    pub fn from_collection(collection: Collection<Application>) -> Self {
        Self { collection }
    }

    pub async fn ensure_submitted_at_index(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(), CollectionError> {
        let mut keys = Document::new();
        keys.insert(field::SUBMITTED_AT, 1);
        let model = IndexModel::builder().keys(keys).build();
        let created = bounded(timeout, self.collection.create_index(model)).await?;
        debug!(index = %created.index_name, "submitted_at index ensured");
        Ok(())
    }
}

fn by_id(id: &ApplicationId) -> Document {
    doc! { "_id": id.as_str() }
}

/// Await a driver call, bounded by `timeout` when one is given.
async fn bounded<F, T>(timeout: Option<Duration>, call: F) -> Result<T, CollectionError>
where
    F: IntoFuture<Output = mongodb::error::Result<T>>,
{
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call.into_future())
            .await
            .map_err(|_| CollectionError::TimedOut(limit))?,
        None => call.into_future().await,
    };
    result.map_err(classify)
}

fn classify(err: DriverError) -> CollectionError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE => {
            CollectionError::Conflict
        }
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            CollectionError::Codec(err.to_string())
        }
        _ => CollectionError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl ApplicationCollection for MongoApplicationCollection {
    async fn insert_one(
        &self,
        application: &Application,
        timeout: Option<Duration>,
    ) -> Result<(), CollectionError> {
        bounded(timeout, self.collection.insert_one(application)).await?;
        Ok(())
    }

    async fn find_one(
        &self,
        id: &ApplicationId,
        timeout: Option<Duration>,
    ) -> Result<Option<Application>, CollectionError> {
        bounded(timeout, self.collection.find_one(by_id(id))).await
    }

    async fn update_one(
        &self,
        id: &ApplicationId,
        fields: &Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<UpdateOutcome, CollectionError> {
        let set = to_document(fields).map_err(|err| CollectionError::Codec(err.to_string()))?;
        let result = bounded(
            timeout,
            self.collection.update_one(by_id(id), doc! { "$set": set }),
        )
        .await?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(
        &self,
        id: &ApplicationId,
        timeout: Option<Duration>,
    ) -> Result<u64, CollectionError> {
        let result = bounded(timeout, self.collection.delete_one(by_id(id))).await?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_call_times_out_with_configured_limit() {
        let limit = Duration::from_millis(10);
        let pending = std::future::pending::<mongodb::error::Result<()>>();

        match bounded(Some(limit), pending).await {
            Err(CollectionError::TimedOut(elapsed)) => assert_eq!(elapsed, limit),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unbounded_call_passes_result_through() {
        let ready = std::future::ready(mongodb::error::Result::Ok(7_u64));
        assert_eq!(bounded(None, ready).await.expect("ready value"), 7);
    }

    fn write_error(code: i32) -> DriverError {
        let write: mongodb::error::WriteError = mongodb::bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: mortgage_db.applications",
        })
        .expect("write error decodes");
        DriverError::from(ErrorKind::Write(WriteFailure::WriteError(write)))
    }

    #[test]
    fn duplicate_key_write_error_is_a_conflict() {
        assert!(matches!(
            classify(write_error(DUPLICATE_KEY_CODE)),
            CollectionError::Conflict
        ));
    }

    #[test]
    fn other_write_errors_are_unavailable() {
        assert!(matches!(
            classify(write_error(121)),
            CollectionError::Unavailable(_)
        ));
    }

    #[test]
    fn id_filter_targets_primary_key() {
        let filter = by_id(&ApplicationId::from("alice"));
        assert_eq!(filter.get_str("_id").expect("string id"), "alice");
        assert_eq!(filter.len(), 1);
    }
}
