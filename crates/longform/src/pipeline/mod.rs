//! Document generation pipeline: outline, sections, integration.

pub mod comparison;
pub mod config;
pub mod digest;
pub mod error;
pub mod integrator;
pub mod locks;
pub mod orchestrator;
pub mod outline;
pub mod prompts;
pub mod section;
pub mod topology;

pub use config::PipelineSettings;
pub use digest::{build_digest, Digest};
pub use error::{IntegrationError, PipelineError};
pub use integrator::integrate;
pub use locks::KeyedLocks;
pub use orchestrator::Orchestrator;
pub use outline::{parse_outline, Outline, PlannedSection};
pub use section::{SectionOutcome, SectionPipeline};
pub use topology::StepPlan;
