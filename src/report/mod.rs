//! Report rendering for the presentation layer.

pub mod generator;

pub use generator::{
    format_eta_measure, format_progress, generate_json_report, generate_markdown_report,
};
