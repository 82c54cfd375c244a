//! Orchestration front door

mod builder;
mod orchestrator;

pub use builder::{Raven, RavenBuilder};
pub use orchestrator::{Orchestrator, RoutingInfo};
