//! ArtyPacks converter - brushset to image-pack conversion backend
//!
//! Accepts uploaded `.brushset` containers, extracts the stamp images that
//! meet the minimum-resolution policy, repackages them into a downloadable
//! zip, and gates every conversion behind a prepaid license-credit check
//! against a remote service.
//!
//! ## Components
//!
//! - **convert**: the core pipeline (inspect, qualify, assemble, orchestrate)
//! - **license**: remote credit-decrement gate
//! - **delivery**: local-disk and object-store sinks for output packs
//! - **db**: MongoDB provenance log and recovery lookups
//! - **server/routes**: hyper HTTP surface

pub mod config;
pub mod convert;
pub mod db;
pub mod delivery;
pub mod license;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ConvertError, Result};
