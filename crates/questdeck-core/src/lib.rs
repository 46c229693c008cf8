//! # QuestDeck Core Library
//!
//! Rotation and cache-consistency engine for QuestDeck challenges. Every
//! user holds a small, locally materialized selection of daily and weekly
//! challenges drawn from a shared, administrator-owned catalog. This crate
//! decides when those selections rotate and keeps them consistent when the
//! administrator edits or deletes a catalog item. The `questdeck` CLI is a
//! thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Rotation**: pure calendar rules for when a snapshot is stale
//! - **Sampler**: uniform draws with an injectable RNG
//! - **Cache**: per-user, per-category snapshots over a swappable
//!   composite-key store (SQLite, files, memory)
//! - **Propagation**: concurrent per-user fan-out of catalog edits/deletes
//! - **Storage**: SQLite catalog and TOML configuration
//!
//! ## Key Components
//!
//! - [`ChallengeService`]: user read path and admin mutation path
//! - [`Propagator`]: catalog mutation fan-out
//! - [`LocalCache`]: typed snapshot cache
//! - [`CatalogDb`]: SQLite catalog, users and completions
//! - [`Config`]: application configuration

pub mod cache;
pub mod catalog;
pub mod completion;
pub mod error;
pub mod model;
pub mod propagation;
pub mod rotation;
pub mod sampler;
pub mod service;
pub mod storage;

pub use cache::{FileStore, LocalCache, MemoryStore, SnapshotKey, SnapshotStore};
pub use catalog::{AdminPolicy, AnyAdmin, Catalog, StaticAdmins};
pub use error::{CacheError, CatalogError, ConfigError, CoreError, StoreError, ValidationError};
pub use model::{CachedSelection, Category, Challenge, ChallengeId, ChallengePatch, CompletionRecord, UserId};
pub use propagation::{PropagationConfig, PropagationReport, Propagator};
pub use rotation::{is_due_in, should_rotate, RotationConfig};
pub use service::ChallengeService;
pub use storage::{CatalogDb, Config, SqliteSnapshotStore, StorageBackend};
