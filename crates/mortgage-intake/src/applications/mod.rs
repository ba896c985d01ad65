//! Mortgage application intake and record access over a single document collection.
//!
//! [`ApplicationStore`] is the entry point: it normalizes untyped payloads against the field
//! table in [`schema`], validates the required fields, and delegates persistence to an
//! [`ApplicationCollection`] implementation (MongoDB in production, in-memory for tests and
//! local runs).

pub mod domain;
pub mod memory;
pub mod mongo;
pub mod repository;
pub mod router;
pub mod schema;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{Application, ApplicationId, ApplicationIntake, PropertyType};
pub use memory::InMemoryApplicationCollection;
pub use mongo::MongoApplicationCollection;
pub use repository::{ApplicationCollection, CollectionError, UpdateOutcome};
pub use router::application_router;
pub use schema::ValidationError;
pub use service::{ApplicationStore, ApplicationStoreError};
