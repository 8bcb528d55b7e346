// In: src/lib.rs

//! Entropy codec for compressed detector-cluster records.
//!
//! A record is a bundle of fixed-width integer columns whose lengths are all
//! governed by a small set of counters. The crate provides two views of such a
//! record and the lossless transformation between them:
//!
//! - **Flat region** ([`FlatRegion`]): the counters header followed by every
//!   column at a deterministic, naturally-aligned offset. This is the working
//!   representation consumers index into directly.
//! - **Container** ([`Container`]): the compact archival form. Each column (or
//!   combined column pair) becomes one independently coded stream, stored
//!   entropy-coded, bit-packed or raw, whichever is smallest.
//!
//! [`ClusterCodec`] is the façade tying the two together. Encoding is
//! configurable (wire version, column combination); decoding is self-describing
//! and honors whatever the container declares.

pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod kernels;
pub mod schema;
pub mod store;

pub use codec::ClusterCodec;
pub use config::{AnsVersion, CodecConfig};
pub use container::{Container, ContainerInfo, StreamMode, StreamSection};
pub use error::CctfError;
pub use schema::layout::{FlatLayout, FlatRegion};
pub use schema::{ColumnFamily, ColumnId, Counters, COLUMN_ORDER};
pub use store::{EntryStore, MemoryEntryStore};

/// The version of the cctf-core crate, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
