//! # Widgetry Registry
//!
//! The published side of widgetry: the API tree that clients read, and the
//! writer that turns a validated publish plan into it.
//!
//! - `index.<collection>.json` lists the latest version of every item
//! - `<collection>/<publisher>/<slug>/meta.json` describes the latest publish
//! - `<collection>/<publisher>/<slug>/versions.json` is the newest-first history
//! - `<collection>/<publisher>/<slug>/files/` holds the captured readme and changelog
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use widgetry::memory::{MemoryCheckout, MemoryPackager};
//! use widgetry::{PublishPlan, SkipAttestation};
//! use widgetry_registry::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let storage = FileSystemStorage::new("api").await?;
//! let publisher = RegistryPublisher::new(
//!     ApiStore::new(Arc::new(storage)),
//!     Arc::new(MemoryCheckout::new()),
//!     Arc::new(MemoryPackager::new()),
//!     Arc::new(SkipAttestation),
//!     PublishOptions::new("ghcr.io", "widgetry", "v1"),
//! );
//!
//! let plan = PublishPlan::read("publish-plan.json".as_ref()).await?;
//! let index = publisher.run(&plan).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod index;
pub mod meta;
pub mod publish;
pub mod special_files;
pub mod storage;

pub use api::ApiStore;
pub use error::{RegistryError, Result};
pub use index::{CollectionIndex, IndexEntry, RegistryIndex};
pub use meta::{ItemMetadata, VersionHistory, VersionRecord};
pub use publish::{PublishOptions, RegistryPublisher};
pub use storage::{BlobStorage, FileSystemStorage, MemoryStorage, StorageError};
