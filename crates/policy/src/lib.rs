//! Policy decisions over a [`HostCatalog`](bkm_catalog::HostCatalog).
//!
//! Both policies only look at each host's `(number, age)` pairs and are pure:
//! nothing here talks to the object store. Acting on a decision (deleting,
//! triggering an archive run) is up to the caller.

mod retention;
mod schedule;

pub use crate::retention::{Deletion, RetentionPolicy};
pub use crate::schedule::{HostScore, rank_hosts, score_host};
