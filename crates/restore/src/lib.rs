//! Turns a cataloged backup into something a person can restore from.
//!
//! A [`RestorePlan`] holds one time-limited download URL per data part, in
//! reassembly order. A [`RestoreScript`] renders that plan into a POSIX shell
//! script which downloads, decrypts and unpacks the parts into an empty
//! directory without needing credentials for the object store.

pub mod error;
mod plan;
mod script;

pub use crate::plan::{RestorePart, RestorePlan};
pub use crate::script::RestoreScript;
