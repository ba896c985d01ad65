use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::domain::{Application, ApplicationId};
use super::repository::{ApplicationCollection, CollectionError, UpdateOutcome};

type Documents = BTreeMap<ApplicationId, Map<String, Value>>;

/// Process-local collection holding raw JSON documents keyed by `_id`.
///
/// Calls complete without suspending, so caller deadlines never elapse.
#[derive(Debug, Default, Clone)]
pub struct InMemoryApplicationCollection {
    documents: Arc<Mutex<Documents>>,
}

impl InMemoryApplicationCollection {
    /// Number of stored documents. Fails like every other call once the lock is poisoned.
    pub fn len(&self) -> Result<usize, CollectionError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, CollectionError> {
        Ok(self.lock()?.is_empty())
    }

    /// Raw stored document, exactly as a later `find_one` would decode it.
    pub fn document(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Map<String, Value>>, CollectionError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, CollectionError> {
        self.documents
            .lock()
            .map_err(|_| CollectionError::Unavailable("in-memory collection poisoned".to_string()))
    }
}

#[async_trait]
impl ApplicationCollection for InMemoryApplicationCollection {
    async fn insert_one(
        &self,
        application: &Application,
        _timeout: Option<Duration>,
    ) -> Result<(), CollectionError> {
        let document = match serde_json::to_value(application) {
            Ok(Value::Object(document)) => document,
            Ok(other) => {
                return Err(CollectionError::Codec(format!(
                    "application encoded as {other} instead of a document"
                )))
            }
            Err(err) => return Err(CollectionError::Codec(err.to_string())),
        };

        let mut documents = self.lock()?;
        if documents.contains_key(&application.identifier) {
            return Err(CollectionError::Conflict);
        }
        documents.insert(application.identifier.clone(), document);
        Ok(())
    }

    async fn find_one(
        &self,
        id: &ApplicationId,
        _timeout: Option<Duration>,
    ) -> Result<Option<Application>, CollectionError> {
        let document = match self.lock()?.get(id) {
            Some(document) => document.clone(),
            None => return Ok(None),
        };

        serde_json::from_value(Value::Object(document))
            .map(Some)
            .map_err(|err| CollectionError::Codec(err.to_string()))
    }

    async fn update_one(
        &self,
        id: &ApplicationId,
        fields: &Map<String, Value>,
        _timeout: Option<Duration>,
    ) -> Result<UpdateOutcome, CollectionError> {
        let mut documents = self.lock()?;
        let Some(document) = documents.get_mut(id) else {
            return Ok(UpdateOutcome::default());
        };

        let mut changed = false;
        for (key, value) in fields {
            if document.get(key) != Some(value) {
                document.insert(key.clone(), value.clone());
                changed = true;
            }
        }

        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(changed),
        })
    }

    async fn delete_one(
        &self,
        id: &ApplicationId,
        _timeout: Option<Duration>,
    ) -> Result<u64, CollectionError> {
        let removed = self.lock()?.remove(id);
        Ok(u64::from(removed.is_some()))
    }
}
