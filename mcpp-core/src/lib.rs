//! The MCPP engine: data cache, placeholder resolver, reference finder,
//! policy evaluator, and consent coordinator.
//!
//! Each module owns exactly one of these components and takes the others
//! only as explicit arguments or constructor parameters — there are no
//! module-level singletons, so tests can construct fresh engines without
//! cross-test leakage.

pub mod cache;
pub mod config;
pub mod consent;
pub mod error;
pub mod placeholder_engine;
pub mod policy;
pub mod reference_finder;

pub use cache::DataCache;
pub use config::load_config;
pub use consent::AwaitOutcome;
pub use consent::CachedConsent;
pub use consent::ConsentCoordinator;
pub use error::CoreError;
pub use placeholder_engine::PlaceholderEngine;
pub use placeholder_engine::ResolutionStatus;
pub use policy::EvaluatorResult;
pub use policy::PolicyEvaluator;
pub use policy::ValidationDetails;
pub use reference_finder::ReferenceFinder;
pub use reference_finder::ReferenceMatch;
