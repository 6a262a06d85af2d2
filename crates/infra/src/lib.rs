//! Infrastructure layer: controller channel, indexing, reconciliation,
//! per-system workers, persistence and configuration.

pub mod config;
pub mod controller;
pub mod indexer;
pub mod reconciler;
pub mod registry;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, WarehouseConfig};
pub use controller::{
    BindError, ChannelConfig, ChannelError, CommandChannel, Controller, ControllerTransport,
    OutboundFrame,
};
pub use indexer::{IndexError, StorageIndexer};
pub use reconciler::{IndexFailure, ReindexReport, RemovedProcessor, TopologyReconciler};
pub use registry::{SystemHandle, SystemRegistry, RESERVED_SYSTEM_NAMES};
pub use store::{InMemorySystemStore, JsonFileSystemStore, StoreError, SystemStore};
