//! `highwaysmap` - Current road closures on an interactive map
//!
//! This library fetches closure situations from the National Highways API,
//! styles each closure by its cause and severity, and renders them as a
//! Leaflet map page served over HTTP.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod client;
pub mod closure;
pub mod config;
pub mod error;
pub mod logging;
pub mod payload;
pub mod render;
pub mod server;
pub mod style;

pub use client::{ClosureSource, FileSource, HighwaysClient};
pub use closure::{Cause, ClosureRecord, Geometry, Severity};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use render::MapRenderer;
pub use style::{Style, StyleTable};
