//! foldsync Core - Domain types, ports and configuration
//!
//! This crate is the hexagonal core shared by every other foldsync crate:
//! - **Domain types** - `RemoteId`, `RemoteEntry`, `LocalEntry`, `NameKey`,
//!   and the persisted `SyncStateSnapshot`
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`,
//!   `ILocalFileSystem`, `ISyncStateStore`
//! - **Configuration** - Typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module holds plain data with no I/O. Ports define the trait
//! interfaces the sync engine depends on; adapter crates implement them.

pub mod config;
pub mod domain;
pub mod ports;
