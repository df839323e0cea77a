//! FreeCfd Core Library
//!
//! This crate provides the redirect engine behind the FreeCfd browser
//! extension: user rules map URL patterns to a redirect prefix, and every
//! top-level navigation is checked against them.
//!
//! # Architecture
//!
//! Settings are loaded from a key/value backend, migrated to the current
//! layout, and published together with their compiled matchers as one
//! immutable snapshot. The interceptor reads a snapshot per event and gates
//! redirects through a per-target debouncer.
//!
//! # Modules
//!
//! - `pattern`: Wildcard pattern compiler
//! - `cache`: Matcher cache keyed by match entry id
//! - `migrate`: Legacy layout migration
//! - `store`: Settings store and persistence backend trait
//! - `debounce`: Per-target redirect cooldown
//! - `interceptor`: Navigation decision procedure
//! - `defaults`: Built-in bootstrap settings
//! - `config`: Timing policy and storage key
//! - `types`: Shared type definitions

pub mod cache;
pub mod config;
pub mod debounce;
pub mod defaults;
pub mod interceptor;
pub mod migrate;
pub mod pattern;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use cache::MatcherCache;
pub use config::{InterceptorConfig, STORAGE_KEY};
pub use debounce::RedirectDebouncer;
pub use defaults::default_settings;
pub use interceptor::{decide, Interceptor, NavigationSink};
pub use migrate::{migrate, Migrated, MigrationError, RawSettings};
pub use pattern::{compile, Matcher, PatternCompileError};
pub use store::{
    LoadOutcome, LoadSource, MemoryBackend, PersistenceBackend, SettingsSnapshot, SettingsStore,
    StorageError,
};
pub use types::{Decision, EditError, EditOp, MatchEntry, NavigationEvent, Redirect, Rule, Settings, TargetId};
