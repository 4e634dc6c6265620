//! Goal-directed web navigation agent.
//!
//! Given a start URL and a natural-language goal, Wayfinder renders the page,
//! tags its interactive elements, asks a language model whether to follow a
//! link, extract data, or give up, and repeats until it reaches a terminal
//! state. See [`wayfinder::Wayfinder`] for the entry points.

pub mod browser;
pub mod config;
pub mod dom_scripts;
pub mod extractor;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod navigator;
pub mod oracle;
pub mod runtime;
pub mod types;
pub mod wayfinder;

pub use config::{ConfigError, Verbosity, WayfinderConfig};
pub use navigator::{NavigationOutcome, NavigationStep};
pub use types::{Decision, ElementDescriptor, ExtractionResult, PageSnapshot};
pub use wayfinder::{Wayfinder, WayfinderError};
