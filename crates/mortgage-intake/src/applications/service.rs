use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::domain::{Application, ApplicationId, ApplicationIntake};
use super::repository::{ApplicationCollection, CollectionError};
use super::schema::{self, ValidationError};

/// Facade validating intake payloads and mapping collection results to store outcomes.
///
/// Cloning is cheap; clones share the underlying collection.
pub struct ApplicationStore<C> {
    collection: Arc<C>,
    timeout: Option<Duration>,
}

impl<C> Clone for ApplicationStore<C> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            timeout: self.timeout,
        }
    }
}

impl<C> ApplicationStore<C>
where
    C: ApplicationCollection + 'static,
{
    pub fn new(collection: Arc<C>) -> Self {
        Self {
            collection,
            timeout: None,
        }
    }

    /// Handle over the same collection whose calls fail with
    /// [`ApplicationStoreError::StoreUnavailable`] once `timeout` elapses.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn collection(&self) -> &Arc<C> {
        &self.collection
    }

    /// Normalize, validate and insert an untyped intake payload.
    pub async fn create(&self, payload: &Value) -> Result<ApplicationId, ApplicationStoreError> {
        let intake = ApplicationIntake::from_payload(payload).map_err(rejected)?;
        self.create_intake(intake).await
    }

    /// Validate an already-typed intake and insert it.
    pub async fn create_intake(
        &self,
        intake: ApplicationIntake,
    ) -> Result<ApplicationId, ApplicationStoreError> {
        let application = intake.into_application(Utc::now()).map_err(rejected)?;
        let identifier = application.identifier.clone();

        match self.collection.insert_one(&application, self.timeout).await {
            Ok(()) => {
                debug!(%identifier, "application created");
                Ok(identifier)
            }
            Err(CollectionError::Conflict) => {
                warn!(%identifier, "application identifier already taken");
                Err(ApplicationStoreError::DuplicateKey { identifier })
            }
            Err(err) => Err(unavailable("insert_one", err)),
        }
    }

    /// Point lookup by identifier; a missing record is `Ok(None)`.
    pub async fn get(
        &self,
        identifier: &ApplicationId,
    ) -> Result<Option<Application>, ApplicationStoreError> {
        self.collection
            .find_one(identifier, self.timeout)
            .await
            .map_err(|err| unavailable("find_one", err))
    }

    /// Merge `fields` into the stored record. Returns `true` only when a stored value changed.
    pub async fn update(
        &self,
        identifier: &ApplicationId,
        fields: &Map<String, Value>,
    ) -> Result<bool, ApplicationStoreError> {
        let fields = schema::normalize_update(fields).map_err(rejected)?;
        if fields.is_empty() {
            return Ok(false);
        }

        let outcome = self
            .collection
            .update_one(identifier, &fields, self.timeout)
            .await
            .map_err(|err| unavailable("update_one", err))?;

        debug!(
            %identifier,
            matched = outcome.matched,
            modified = outcome.modified,
            "application update applied"
        );
        Ok(outcome.changed())
    }

    /// Remove the record. Returns `true` when a record existed.
    pub async fn delete(&self, identifier: &ApplicationId) -> Result<bool, ApplicationStoreError> {
        let deleted = self
            .collection
            .delete_one(identifier, self.timeout)
            .await
            .map_err(|err| unavailable("delete_one", err))?;

        debug!(%identifier, deleted, "application delete applied");
        Ok(deleted > 0)
    }
}

fn rejected(err: ValidationError) -> ApplicationStoreError {
    warn!(field = err.field().unwrap_or("payload"), error = %err, "application input rejected");
    ApplicationStoreError::Validation(err)
}

fn unavailable(operation: &'static str, err: CollectionError) -> ApplicationStoreError {
    error!(operation, error = %err, "application collection call failed");
    ApplicationStoreError::StoreUnavailable(err)
}

/// Error raised by the application store.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationStoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("application {identifier} already exists")]
    DuplicateKey { identifier: ApplicationId },
    #[error("application store unavailable: {0}")]
    StoreUnavailable(#[source] CollectionError),
}
