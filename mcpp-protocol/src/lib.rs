//! Domain model for the Model Context Privacy Protocol (MCPP).
//!
//! This crate has no engine logic — it defines the protocol's entities
//! (`CallId`, `CachedEntry`, `Placeholder`, `Tool`, `Target`,
//! `UsageContext`, `TargetCategory`, `ConsentDecision`, ...) plus the
//! server-wide `ServerConfig` they are evaluated against. `mcpp-core`
//! contains the cache, resolver, evaluator, and coordinator that operate on
//! these types.

pub mod cache_entry;
pub mod config;
pub mod consent;
pub mod ids;
pub mod placeholder;
pub mod target;
pub mod tool;
pub mod usage;

pub use cache_entry::CachedEntry;
pub use cache_entry::EntryKind;
pub use cache_entry::EntryMetadata;
pub use cache_entry::TableData;
pub use config::ServerConfig;
pub use consent::ConsentDecision;
pub use consent::DecisionCacheKey;
pub use ids::CallId;
pub use placeholder::Placeholder;
pub use target::Target;
pub use target::TargetCategory;
pub use target::TargetType;
pub use tool::DataPolicy;
pub use tool::PermissionValue;
pub use tool::Tool;
pub use usage::DataUsage;
pub use usage::Requester;
pub use usage::UsageContext;
