//! Analysis modules.
//!
//! Normalization of raw export pages, epic aggregation, and the
//! progress/ETA projection.

pub mod aggregator;
pub mod normalizer;
pub mod projection;

pub use aggregator::*;
pub use normalizer::Normalizer;
pub use projection::summarize_project;
