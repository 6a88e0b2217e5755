//! Subcommand implementations, kept apart from argument parsing and the
//! object store connection so they can run against any [`Catalog`].

use crate::error::{ErrorKind, Result};
use bkm_catalog::{Catalog, DeletionReport, HostCatalog, Inventory, StrayReason};
use bkm_policy::{Deletion, HostScore, RetentionPolicy, rank_hosts};
use bkm_restore::{RestorePlan, RestoreScript};
use exn::ResultExt;
use std::time::Duration;
use time::OffsetDateTime;

/// Human-readable listing of every backup, or of one host's backups.
pub(crate) async fn list(catalog: &mut Catalog, host: Option<&str>, now: OffsetDateTime) -> Result<String> {
    let inventory = inventory(catalog, host).await?;
    let mut lines = Vec::new();
    for hostname in inventory.backups.hostnames().filter(|h| host.is_none_or(|host| host == *h)) {
        lines.push(hostname.to_string());
        for record in inventory.backups.host(hostname).into_iter().flat_map(|r| r.values()) {
            lines.push(format!(
                "  #{:<6} {:>12}  {:>3} part(s)  {:>10}  {}",
                record.number,
                record.finalized_age(now).to_string(),
                record.data_keys().len(),
                human_bytes(record.size()),
                record.bucket,
            ));
        }
    }
    if host.is_none() {
        lines.extend(inventory.strays.iter().map(|stray| {
            let reason = match stray.reason {
                StrayReason::Malformed => "malformed name",
                StrayReason::OrphanMarker => "orphan marker",
            };
            format!("stray: {}/{} ({reason})", stray.bucket, stray.object.key)
        }));
    }
    lines.extend(inventory.duplicates.iter().map(|duplicate| {
        format!(
            "duplicate: {} #{} in {} and {}",
            duplicate.hostname, duplicate.number, duplicate.kept, duplicate.ignored
        )
    }));
    Ok(lines.into_iter().map(|line| line + "\n").collect())
}

/// Restore script for one backup, with download links valid for `expiry`.
pub(crate) async fn script(
    catalog: &mut Catalog,
    host: &str,
    number: u64,
    expiry: Duration,
    now: OffsetDateTime,
) -> Result<String> {
    let record = catalog.resolve(host, number).await.or_raise(|| ErrorKind::Catalog)?;
    let plan =
        RestorePlan::build(catalog.store().as_ref(), &record, expiry, now).await.or_raise(|| ErrorKind::Restore)?;
    RestoreScript::new().and_then(|script| script.render(&plan)).or_raise(|| ErrorKind::Restore)
}

/// Delete one named backup or, without a backup number, everything the
/// retention policy selects (optionally limited to one host).
///
/// In a dry-run catalog nothing is removed; the report counts what would be.
pub(crate) async fn delete(
    catalog: &mut Catalog,
    host: Option<&str>,
    backup: Option<u64>,
    policy: RetentionPolicy,
    now: OffsetDateTime,
) -> Result<(Vec<(String, Deletion)>, DeletionReport)> {
    if let (Some(host), Some(number)) = (host, backup) {
        let record = catalog.resolve(host, number).await.or_raise(|| ErrorKind::Catalog)?;
        let age = record.finalized_age(now).seconds().unwrap_or_default();
        let report = catalog.delete(&record).await.or_raise(|| ErrorKind::Catalog)?;
        return Ok((vec![(host.to_string(), Deletion { number, age })], report));
    }

    let inventory = inventory(catalog, host).await?;
    let mut deleted = Vec::new();
    let mut report = DeletionReport::default();
    for (hostname, deletions) in policy.select_for_deletion(&inventory.backups, now) {
        if host.is_some_and(|host| host != hostname) {
            continue;
        }
        for deletion in deletions {
            let Some(record) = inventory.backups.get(&hostname, deletion.number) else {
                continue;
            };
            report += catalog.delete(record).await.or_raise(|| ErrorKind::Catalog)?;
            deleted.push((hostname.clone(), deletion));
        }
    }
    Ok((deleted, report))
}

/// Every host ranked by need for a new backup, most urgent first.
pub(crate) async fn schedule(catalog: &mut Catalog, target: usize, now: OffsetDateTime) -> Result<Vec<HostScore>> {
    let inventory = inventory(catalog, None).await?;
    Ok(rank_hosts(&inventory.backups, target, now))
}

/// The full inventory, failing when `host` is given but has no backups.
async fn inventory(catalog: &mut Catalog, host: Option<&str>) -> Result<Inventory> {
    let inventory = catalog.all_backups().await.or_raise(|| ErrorKind::Catalog)?;
    if let Some(host) = host {
        require_host(&inventory.backups, host)?;
    }
    Ok(inventory)
}

fn require_host(backups: &HostCatalog, host: &str) -> Result<()> {
    if !backups.contains_host(host) {
        let missing: bkm_catalog::error::Result<()> =
            Err(bkm_catalog::error::ErrorKind::HostNotFound(host.to_string()).into());
        missing.or_raise(|| ErrorKind::Catalog)?;
    }
    Ok(())
}

pub(crate) fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{bytes} B") } else { format!("{size:.1} {}", UNITS[unit]) }
}
