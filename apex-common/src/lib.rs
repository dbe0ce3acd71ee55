//! # APEX Common Library
//!
//! Shared code for the APEX intake services including:
//! - Error types
//! - Configuration loading (TOML + config file discovery)
//! - Reference dataset (routines, report definitions, field specs)
//! - Detection event types and EventBus

pub mod config;
pub mod dataset;
pub mod error;
pub mod events;

pub use dataset::{FieldSpec, ReferenceDataset, ReportDefinition, Routine};
pub use error::{Error, Result};
pub use events::{ApexEvent, EventBus};
