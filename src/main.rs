mod cli;
mod commands;
mod error;
mod trigger;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use crate::trigger::ArchiveTrigger;
use bkm_catalog::Catalog;
use bkm_config::{Config, StoreConfig};
use bkm_policy::RetentionPolicy;
use bkm_storage::StoreHandle;
use bkm_storage::backend::S3Store;
use clap::Parser;
use exn::ResultExt;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG, when set, wins over -v.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            if err.is_retryable() {
                eprintln!("This may be a temporary failure; try again.");
            }
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    // One logical run owns the catalog and its cache; nothing runs concurrently.
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().or_raise(|| ErrorKind::Runtime)?;
    runtime.block_on(execute(cli.command, config))
}

async fn execute(command: Command, config: Config) -> Result<()> {
    let now = OffsetDateTime::now_utc();
    let dry_run = matches!(command, Command::Delete { test: true, .. });
    let mut catalog = Catalog::new(connect(&config.store)?, config.bucket_prefix.as_str()).with_dry_run(dry_run);
    match command {
        Command::List { host } => {
            print!("{}", commands::list(&mut catalog, host.as_deref(), now).await?);
        },
        Command::Script { host, backup, output } => {
            let script = commands::script(&mut catalog, &host, backup, config.restore.url_expiry(), now).await?;
            match output {
                Some(path) => write_script(&path, &script)?,
                None => print!("{script}"),
            }
        },
        Command::Delete { host, backup, keep, max_age, test } => {
            let policy = RetentionPolicy::new(
                keep.unwrap_or(config.retention.keep),
                max_age.unwrap_or(config.retention.max_age),
            );
            let (deleted, report) = commands::delete(&mut catalog, host.as_deref(), backup, policy, now).await?;
            let verb = if test { "would delete" } else { "deleted" };
            for (hostname, deletion) in &deleted {
                println!("{verb} {hostname} #{} ({})", deletion.number, bkm_catalog::Age::Finalized(deletion.age));
            }
            println!(
                "{} backup(s), {} object(s), {} {verb}",
                deleted.len(),
                report.deleted + report.skipped,
                commands::human_bytes(report.bytes)
            );
        },
        Command::Schedule { target, test } => {
            let ranked = commands::schedule(&mut catalog, target.unwrap_or(config.schedule.target), now).await?;
            for host in &ranked {
                println!("{:>10.3}  {}", host.score, host.hostname);
            }
            let hosts: Vec<String> = ranked.into_iter().filter(|h| h.needs_backup()).map(|h| h.hostname).collect();
            if hosts.is_empty() {
                tracing::info!("No host needs a new backup");
                return Ok(());
            }
            if test {
                println!("would trigger archive run for: {}", hosts.join(" "));
                return Ok(());
            }
            config.validate_schedule().or_raise(|| ErrorKind::Config)?;
            ArchiveTrigger::discover(&config.schedule.archive_command)?.run(&hosts).await?;
        },
    }
    Ok(())
}

fn connect(store: &StoreConfig) -> Result<StoreHandle> {
    let (Some(key_id), Some(key_secret)) = (&store.key_id, &store.key_secret) else {
        exn::bail!(ErrorKind::Credentials);
    };
    Ok(Arc::new(S3Store::new("s3", &store.region, store.endpoint.as_deref(), key_id, key_secret)))
}

fn write_script(path: &Path, script: &str) -> Result<()> {
    std::fs::write(path, script).or_raise(|| ErrorKind::Output(path.to_path_buf()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .or_raise(|| ErrorKind::Output(path.to_path_buf()))?;
    }
    tracing::info!(path = %path.display(), "Wrote restore script");
    Ok(())
}
