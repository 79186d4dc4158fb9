//! run_shell_cmd - sequential shell commands in the project root

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ShellConfig;
use crate::edit::render::truncate;
use crate::tools::registry::{Tool, ToolResult};

const SHELL_OUTPUT_TRUNCATED_NOTICE: &str = "<response clipped><NOTE>The command output exceeded the response limit. Narrow the command (for example with grep, head, or tail) and run it again.</NOTE>";

pub struct RunShellCmdTool {
    project_root: PathBuf,
    limits: ShellConfig,
}

impl RunShellCmdTool {
    pub fn new(project_root: impl Into<PathBuf>, limits: ShellConfig) -> Self {
        Self {
            project_root: project_root.into(),
            limits,
        }
    }

    /// Feed the commands to one bash process so `cd` and variables carry over
    async fn run(&self, commands: &[String], limit: Duration) -> ToolResult {
        let mut child = match Command::new("bash")
            .current_dir(&self.project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolResult::err(format!("ShellError: Failed to start bash: {}", e)),
        };

        let mut script = commands.join("\n");
        script.push('\n');
        let stdin = child.stdin.take();

        // dropping the future on timeout drops the child, which kills it
        let session = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(script.as_bytes()).await {
                    // bash may exit before reading everything (e.g. `exit 1`)
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
            child.wait_with_output().await
        };

        match timeout(limit, session).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let code = output.status.code();
                debug!(
                    "Shell call with {} commands exited with {:?}",
                    commands.len(),
                    code
                );
                ToolResult::ok(truncate(
                    render_output(&stdout, &stderr, code),
                    self.limits.max_output_chars,
                    SHELL_OUTPUT_TRUNCATED_NOTICE,
                ))
            }
            Ok(Err(e)) => ToolResult::err(format!("ShellError: {}", e)),
            Err(_) => {
                warn!("Shell call timed out after {}s", limit.as_secs());
                ToolResult::err(format!(
                    "TimeoutError: Commands did not finish within {} seconds",
                    limit.as_secs()
                ))
            }
        }
    }
}

/// Stdout first, then stderr and a non-zero exit status when present
fn render_output(stdout: &str, stderr: &str, code: Option<i32>) -> String {
    let mut out = stdout.to_string();
    if !stderr.is_empty() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("[stderr]\n");
        out.push_str(stderr);
    }
    match code {
        Some(0) => {}
        Some(code) => {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("[exit code {}]", code));
        }
        None => {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("[terminated by signal]");
        }
    }
    out
}

#[derive(Deserialize)]
struct Params {
    commands: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[async_trait]
impl Tool for RunShellCmdTool {
    fn name(&self) -> &str {
        "run_shell_cmd"
    }

    fn description(&self) -> &str {
        "Run a list of shell commands in sequential order and return their output. \
         The working directory is the root of the project, and all commands share one \
         bash process, so `cd` and exported variables carry over to later commands. \
         Stderr and a non-zero exit status are appended to the output."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "commands": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "A list of shell commands to be run in sequential order"
                },
                "timeout_secs": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Time limit for all commands together (default from configuration)"
                }
            },
            "required": ["commands"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::invalid_params(format!("Invalid parameters: {}", e)),
        };
        if params.commands.is_empty() {
            return ToolResult::invalid_params("`commands` must list at least one command");
        }

        let secs = params
            .timeout_secs
            .filter(|s| *s > 0)
            .unwrap_or(self.limits.timeout_secs);
        self.run(&params.commands, Duration::from_secs(secs)).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool(dir: &TempDir) -> RunShellCmdTool {
        RunShellCmdTool::new(dir.path(), ShellConfig::default())
    }

    #[tokio::test]
    async fn test_commands_share_one_shell() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.py"), "").unwrap();

        let result = tool(&dir)
            .execute(json!({"commands": ["cd sub", "ls", "GREETING=done", "echo $GREETING"]}))
            .await;
        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.output, "inner.py\ndone\n");
    }

    #[tokio::test]
    async fn test_runs_in_project_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let result = tool(&dir).execute(json!({"commands": ["ls"]})).await;
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_and_stderr_are_reported() {
        let dir = TempDir::new().unwrap();
        let result = tool(&dir)
            .execute(json!({"commands": ["echo before", "echo oops >&2", "exit 3", "echo after"]}))
            .await;
        assert!(result.ok);
        assert_eq!(result.output, "before\n[stderr]\noops\n[exit code 3]");
    }

    #[tokio::test]
    async fn test_timeout_kills_commands() {
        let dir = TempDir::new().unwrap();
        let result = tool(&dir)
            .execute(json!({"commands": ["sleep 5"], "timeout_secs": 1}))
            .await;
        assert!(!result.ok);
        assert!(result.error.unwrap().starts_with("TimeoutError"));
    }

    #[tokio::test]
    async fn test_long_output_is_clipped() {
        let dir = TempDir::new().unwrap();
        let limits = ShellConfig {
            max_output_chars: 100,
            ..ShellConfig::default()
        };
        let result = RunShellCmdTool::new(dir.path(), limits)
            .execute(json!({"commands": ["seq 1 1000"]}))
            .await;
        assert!(result.output.ends_with(SHELL_OUTPUT_TRUNCATED_NOTICE));
    }

    #[tokio::test]
    async fn test_empty_command_list_is_invalid() {
        let dir = TempDir::new().unwrap();
        let result = tool(&dir).execute(json!({"commands": []})).await;
        assert!(result.error.unwrap().starts_with("InvalidParameterError"));
    }
}
