//! Provenance log persistence

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, ProvenanceStore};
pub use schemas::{ConversionRecord, CONVERSIONS_COLLECTION};
