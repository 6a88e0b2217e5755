//! Backup catalog reconstructed from object names.
//!
//! Nothing but the object store is consulted: every backup record is derived
//! from the names and timestamps of the objects found in backup-bearing
//! buckets, and re-derived whenever the cache for a host is invalidated.
//!
//! # Architecture
//! - **Key parsing** ([`KeyFragment`]): one object name becomes a hostname, a
//!   backup number and a role (data part or finalization marker). Names that
//!   don't fit become [`StrayObject`]s.
//! - **Records** ([`BackupRecord`], [`HostCatalog`]): fragments are folded
//!   into one record per `(hostname, number)`. Folding is idempotent and
//!   order-independent.
//! - **Catalog** ([`Catalog`]): owns the object store handle and a
//!   per-bucket cache, and is the only place backups are deleted from.

mod age;
mod cache;
mod catalog;
pub mod error;
mod key;
mod record;

pub use crate::age::Age;
pub use crate::cache::{BucketCache, BucketListing};
pub use crate::catalog::{Catalog, DeletionReport, Inventory};
pub use crate::key::{ARCHIVE_SUFFIX, ENCRYPTION_SUFFIX, FINALIZATION_SUFFIX, KeyFragment, KeyRole};
pub use crate::record::{BackupRecord, Duplicate, HostCatalog, StrayObject, StrayReason};
