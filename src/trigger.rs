use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::PathBuf;
use tokio::process::Command;

/// External program that performs new backup runs.
///
/// Invoked once with every host needing a backup appended as arguments,
/// most urgent first, and waited on. Its output is passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArchiveTrigger {
    program: PathBuf,
    args: Vec<String>,
}
impl ArchiveTrigger {
    /// Resolve the program of a configured command line through `PATH`.
    pub(crate) fn discover(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            exn::bail!(ErrorKind::TriggerNotFound(String::new()));
        };
        let path = which::which(program).or_raise(|| ErrorKind::TriggerNotFound(program.clone()))?;
        tracing::trace!(program = %path.display(), "Discovered archive command");
        Ok(Self { program: path, args: args.to_vec() })
    }

    /// The full command line for `hosts`, for display.
    pub(crate) fn command_line(&self, hosts: &[String]) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .chain(hosts.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) async fn run(&self, hosts: &[String]) -> Result<()> {
        tracing::info!(command = %self.command_line(hosts), "Triggering archive run");
        let status =
            Command::new(&self.program).args(&self.args).args(hosts).status().await.or_raise(|| ErrorKind::Trigger)?;
        if !status.success() {
            exn::bail!(ErrorKind::TriggerFailed(status.code()));
        }
        Ok(())
    }
}
