//! Processor input resolution.
//!
//! Resolves a declarative processor document against a subject's imaging
//! sessions: which artefacts feed which inputs, every valid combination of
//! them, which combinations already have an assessor, and what a job needs to
//! download for a chosen combination.
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod registry;
pub mod resolve;
pub mod resources;
pub mod selection;
pub mod session;
pub mod util;
pub mod validate;

pub use catalog::{Catalog, InputLookup};
pub use config::{QcVocabulary, ResolutionPolicy, ResolverConfig};
pub use document::ProcessorDocument;
pub use error::{NeedsInputReason, ResolveError};
pub use registry::Registry;
pub use resolve::{ExistingWorkEntry, Resolution, Resolver};
pub use resources::{resolve_resources, ResourcePlan};
pub use session::{ParameterRow, RowValue, Session};
