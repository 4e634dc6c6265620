//! Request-scoped data structures shared by the loader, the oracles and the
//! navigation loop.

pub mod api;
pub mod decision;
pub mod page;

pub use api::{
    ApiEnvelope, HealthStatus, NavigateRequest, ScrapeRequest, SuggestActionRequest,
};
pub use decision::{Decision, NavigateDetails, ReasonDetails};
pub use page::{ElementDescriptor, ExtractionResult, NO_TITLE, PageSnapshot};
