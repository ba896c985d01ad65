use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::domain::{Application, ApplicationId};

/// Result of a single-document `$set` merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

impl UpdateOutcome {
    pub const fn changed(self) -> bool {
        self.modified > 0
    }
}

/// Document collection primitives the application store is built on.
///
/// Every call performs one round trip and honors the caller's deadline when one is given.
/// Duplicate `_id` inserts must fail with [`CollectionError::Conflict`] and leave the stored
/// document untouched.
#[async_trait]
pub trait ApplicationCollection: Send + Sync {
    async fn insert_one(
        &self,
        application: &Application,
        timeout: Option<Duration>,
    ) -> Result<(), CollectionError>;

    async fn find_one(
        &self,
        id: &ApplicationId,
        timeout: Option<Duration>,
    ) -> Result<Option<Application>, CollectionError>;

    async fn update_one(
        &self,
        id: &ApplicationId,
        fields: &Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<UpdateOutcome, CollectionError>;

    async fn delete_one(
        &self,
        id: &ApplicationId,
        timeout: Option<Duration>,
    ) -> Result<u64, CollectionError>;
}

/// Error enumeration for collection failures.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("document with the same _id already exists")]
    Conflict,
    #[error("collection unavailable: {0}")]
    Unavailable(String),
    #[error("collection call did not complete within {0:?}")]
    TimedOut(Duration),
    #[error("stored document could not be encoded or decoded: {0}")]
    Codec(String),
}
