use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "bkm",
    version,
    about = "Catalog, prune and schedule host backups kept in object storage",
    after_help = "\
Configuration is layered (later wins):
  1. built-in defaults
  2. config.toml / config.yaml in the platform config directory
  3. --config <path>
  4. BKM_* environment variables, nested with __ (BKM_RETENTION__KEEP=5)"
)]
pub(crate) struct Cli {
    /// Explicit configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "BKM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List backups per host
    List {
        /// Only show this host
        #[arg(long)]
        host: Option<String>,
    },

    /// Write a self-contained restore script for one backup
    Script {
        #[arg(long)]
        host: String,

        /// Backup number
        #[arg(long)]
        backup: u64,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete one backup, or apply the retention policy
    Delete {
        /// Only consider this host
        #[arg(long)]
        host: Option<String>,

        /// Delete exactly this backup instead of applying retention
        #[arg(long, requires = "host")]
        backup: Option<u64>,

        /// Finalized backups per host to always keep (overrides config)
        #[arg(long, conflicts_with = "backup")]
        keep: Option<usize>,

        /// Delete backups older than this beyond those kept, e.g. 30d, 12h,
        /// 2w or plain seconds (overrides config)
        #[arg(long, value_parser = parse_age, conflicts_with = "backup")]
        max_age: Option<u64>,

        /// Dry run: report what would be deleted
        #[arg(long)]
        test: bool,
    },

    /// Rank hosts by need for a new backup and trigger archive runs
    Schedule {
        /// Finalized backups a host should have (overrides config)
        #[arg(long)]
        target: Option<usize>,

        /// Dry run: report the ranking without running anything
        #[arg(long)]
        test: bool,
    },
}

/// Parse an age given as plain seconds or with an `s`, `m`, `h`, `d` or `w`
/// suffix.
pub(crate) fn parse_age(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let number: u64 = number.parse().map_err(|_| format!("invalid age: '{s}'"))?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 7 * 86_400,
        _ => return Err(format!("unknown age unit: '{unit}'")),
    };
    number.checked_mul(multiplier).ok_or_else(|| format!("age out of range: '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case("90", 90)]
    #[case("90s", 90)]
    #[case("5m", 300)]
    #[case("12h", 43_200)]
    #[case("30d", 2_592_000)]
    #[case("2w", 1_209_600)]
    #[case(" 1d ", 86_400)]
    fn test_parse_age(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_age(input), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("d")]
    #[case("3y")]
    #[case("-1d")]
    #[case("1.5d")]
    #[case("99999999999999999999w")]
    fn test_parse_age_invalid(#[case] input: &str) {
        assert!(parse_age(input).is_err());
    }

    #[test]
    fn test_backup_requires_host() {
        assert!(Cli::try_parse_from(["bkm", "delete", "--backup", "3"]).is_err());
        let cli = Cli::try_parse_from(["bkm", "delete", "--host", "web1", "--backup", "3", "--test"]).unwrap();
        assert!(matches!(cli.command, Command::Delete { backup: Some(3), test: true, .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bkm", "list", "-vv", "--config", "/tmp/bkm.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bkm.toml")));
    }
}
