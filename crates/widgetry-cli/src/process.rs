//! Running external tools

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use widgetry::ExternalError;

/// Captured output of a successful command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args` and wait for it to exit
///
/// A non-zero exit status is an error carrying both output streams.
pub async fn exec<I, S>(
    program: &str,
    args: I,
    cwd: Option<&Path>,
) -> Result<CommandOutput, ExternalError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
    debug!("Running {} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| ExternalError::new(program, format!("could not spawn: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ExternalError::new(program, format!("exited with {}", output.status))
            .with_output(stdout, stderr));
    }

    Ok(CommandOutput { stdout, stderr })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exec_captures_output() {
        let output = exec("sh", ["-c", "echo out; echo err >&2"], None)
            .await
            .unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_exec_failure_keeps_output() {
        let err = exec("sh", ["-c", "echo partial; echo boom >&2; exit 3"], None)
            .await
            .unwrap_err();
        assert_eq!(err.program, "sh");
        assert_eq!(err.stdout, "partial\n");
        assert_eq!(err.stderr, "boom\n");
        assert!(err.to_string().contains("Stderr:\nboom"));
    }

    #[tokio::test]
    async fn test_exec_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "x").unwrap();
        let output = exec("ls", ["marker"], Some(dir.path())).await.unwrap();
        assert_eq!(output.stdout.trim(), "marker");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = exec("widgetry-no-such-tool", Vec::<String>::new(), None)
            .await
            .unwrap_err();
        assert!(err.message.contains("could not spawn"));
    }
}
