//! A read-through/write-through caching layer for key/multi-field stores
//! with strong, explicit control over cache coherence under concurrency.
//!
//! # Features
//! - **Collapsed forwarding**: concurrent populations of one missing
//!   (key, field) coalesce on a distributed mutex into a single origin
//!   fetch.
//! - **Optimistic fencing**: a monotonic per-field counter detects races
//!   between writers; a losing commit purges the entry rather than guess
//!   which value is newer.
//! - **Cold windows**: a post-eviction period during which the cache
//!   deliberately does not repopulate, avoiding stampedes against the
//!   eviction.
//! - **Version isolation**: field names embed a configured version string
//!   (and optionally a type fingerprint), so incompatible cache layouts
//!   never collide.
//! - **Failure policies**: a backend outage either propagates as a typed
//!   error or falls back to the origin, per configuration.
//! - **Bounded batch fan-out**: multi-key operations run in
//!   `ceil(N / parallelism)` chunks, bounding concurrency without bounding
//!   batch size.
//!
//! The engine depends only on narrow collaborator contracts
//! ([`FieldStore`], [`DistributedMutex`], [`Codec`]); in-process reference
//! implementations live in [`memory`], and a Redis-like deployment plugs in
//! its own.

// Public modules that form the API
pub mod builder;
pub mod codec;
pub mod error;
pub mod keyspace;
pub mod memory;
pub mod options;
pub mod store;

// Internal, crate-only modules
mod cache;
mod loader;
mod metrics;
mod retry;
mod shared;
mod single;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use cache::MultiFieldCache;
#[cfg(feature = "serde")]
pub use codec::BincodeCodec;
pub use codec::Codec;
pub use error::{BuildError, CacheError, CodecError, StoreError};
pub use keyspace::TypeFingerprinter;
pub use loader::{LoadResult, ValueLoader, ValueOrLoader};
pub use metrics::MetricsSnapshot;
pub use options::{CacheMode, CacheOptions, FailurePolicy};
pub use single::{SingleFieldCache, SINGLE_FIELD};
pub use store::{DistributedMutex, FieldStore};
