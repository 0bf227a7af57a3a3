//! aceup-core - Core library for AceUp
//!
//! This crate contains the academic planner's models, the local store, the
//! offline-first repositories and the sync manager used by every AceUp
//! interface (CLI today, app shells later).

pub mod analytics;
pub mod config;
pub mod conflict;
pub mod error;
pub mod identity;
pub mod manager;
pub mod models;
pub mod network;
pub mod queue;
pub mod remote;
pub mod repository;
pub mod state;
pub mod store;
pub mod util;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use manager::{
    MemoryRemotes, RemoteProviders, SyncConfig, SyncContext, SyncManager, SyncReport, SyncScope,
};
pub use models::{Entity, EntityId, EntityKind};
pub use network::NetworkMonitor;
pub use repository::{OfflineRepository, RepositoryConfig};
pub use state::{SyncSnapshot, SyncStatus};
