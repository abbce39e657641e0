//! Running external commands: the scheduler and storage clients, and the
//! merge executable itself in local mode.

use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;
use shell_escape::escape;
use std::process::{Command, ExitStatus, Output};

/// An external command that ran but exited unsuccessfully.
#[derive(Debug, thiserror::Error)]
#[error("`{command}` exited with {status}: {stderr}")]
pub struct CommandFailed {
    pub command: String,
    pub status: ExitStatus,
    pub stderr: String,
}

/// Render a command the way a shell user would type it.
pub fn display_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| escape(arg.to_string_lossy()))
        .join(" ")
}

/// Quote an argument list into a single shell command line.
pub fn shell_join(args: &[String]) -> String {
    args.iter().map(|arg| escape(arg.as_str().into())).join(" ")
}

/// Run a command to completion and return its raw output, whatever its exit
/// status.
pub fn run_output(cmd: &mut Command) -> Result<Output> {
    let rendered = display_command(cmd);
    debug!("running {rendered}");
    cmd.output().with_context(|| format!("failed to run {rendered}"))
}

/// Run a command to completion and return its stdout. A non-zero exit status
/// is an error carrying the command's stderr.
pub fn run_checked(cmd: &mut Command) -> Result<String> {
    let output = run_output(cmd)?;
    if !output.status.success() {
        return Err(CommandFailed {
            command: display_command(cmd),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_join() {
        let args: Vec<String> = [
            "library_merge",
            "--rpt_list",
            "1:1;1:2",
            "--study_title",
            "A title",
        ]
        .map(String::from)
        .into();
        assert_eq!(
            shell_join(&args),
            "library_merge --rpt_list '1:1;1:2' --study_title 'A title'"
        );
    }

    #[test]
    fn test_display_command() {
        let mut cmd = Command::new("bmod");
        cmd.arg("-R").arg("rusage[seq_merge=1]").arg("42");
        assert_eq!(display_command(&cmd), "bmod -R 'rusage[seq_merge=1]' 42");
    }

    #[test]
    fn test_run_checked() -> Result<()> {
        assert_eq!(run_checked(Command::new("echo").arg("hello"))?, "hello\n");
        let err = run_checked(Command::new("sh").args(["-c", "echo oops >&2; exit 3"]))
            .unwrap_err();
        let failed = err.downcast_ref::<CommandFailed>().unwrap();
        assert_eq!(failed.stderr, "oops");
        assert_eq!(failed.status.code(), Some(3));
        Ok(())
    }
}
