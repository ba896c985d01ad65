//! Intake and record access for mortgage applications held in a document collection.

pub mod applications;
pub mod config;
pub mod error;
pub mod telemetry;
