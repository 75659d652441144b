//! waypost-app - Pipeline, routing, and configuration for Waypost
//!
//! This crate ties the Device transport to the location pipeline: settings
//! loading, the LocationSource seam, the single-flight pipeline that runs
//! grant → fix → deliver, and the router that turns Device events into
//! pipeline runs.

pub mod config;
pub mod pipeline;
pub mod router;
pub mod source;

// Re-export primary types
pub use config::{default_config_path, load_settings, load_settings_from, Settings};
pub use pipeline::{FixDeliverer, LocalFixDeliverer, LocationPipeline, PipelineEvent};
pub use router::EventRouter;
pub use source::{LocalLocationSource, LocationSource, PresetSource, SourceError};
