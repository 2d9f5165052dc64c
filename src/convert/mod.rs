//! Brushset-to-image-pack conversion pipeline
//!
//! The pipeline is a linear sequence over one uploaded container:
//! inspect (enumerate zip entries) -> qualify (resolution policy) ->
//! assemble (deterministic renaming into a new zip) -> deliver -> log.
//! Each stage owns its data for one invocation; nothing is shared across
//! concurrent requests.

pub mod assembler;
pub mod inspector;
pub mod pipeline;
pub mod qualifier;

pub use assembler::{assemble_pack, sanitize_base_name, OutputPack};
pub use inspector::{inspect_archive, CandidateEntry};
pub use pipeline::{ConversionOutcome, ConversionPipeline, ConversionRequest};
pub use qualifier::{qualify, QualifiedImage, Rejection};
