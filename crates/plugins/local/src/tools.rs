//! Local DevOps tool catalog.
//!
//! `docker_ps` and `git_status` are only registered when the probe found
//! their executable; `run_command` is always available.

use std::sync::Arc;
use std::time::Duration;

use devops_core::config::LocalConfig;
use devops_core::{Arguments, Error, Result, ToolDescriptor, ToolRegistryBuilder, ToolResult};
use serde_json::json;
use tracing::info;

use crate::probe::Capabilities;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::safety;

/// State shared by every local tool.
#[derive(Clone)]
pub struct LocalTools {
    runner: Arc<dyn CommandRunner>,
    settings: LocalConfig,
}

impl LocalTools {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: LocalConfig) -> Self {
        Self { runner, settings }
    }

    async fn docker_ps(&self, args: Arguments) -> Result<ToolResult> {
        let mut spec = CommandSpec::new("docker").arg("ps");
        if args.bool("all")?.unwrap_or(false) {
            spec = spec.arg("-a");
        }

        let output = self.run_checked(spec.timeout(self.default_timeout())).await?;
        Ok(ToolResult::text(format!(
            "Docker containers:\n```\n{}\n```",
            output.stdout.trim_end()
        )))
    }

    async fn git_status(&self, args: Arguments) -> Result<ToolResult> {
        let path = args.non_empty_str("path")?.unwrap_or(".");
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::invalid_argument(
                "path",
                format!("'{}' is not a directory", path),
            ));
        }

        let spec = CommandSpec::new("git")
            .args(["status", "--short"])
            .current_dir(path)
            .timeout(self.default_timeout());
        let output = self.run_checked(spec).await?;

        if output.stdout.trim().is_empty() {
            return Ok(ToolResult::text("✅ Git repository is clean"));
        }
        Ok(ToolResult::text(format!(
            "Git status:\n```\n{}\n```",
            output.stdout.trim_end()
        )))
    }

    async fn run_command(&self, args: Arguments) -> Result<ToolResult> {
        let command = args.require_str("command")?;
        safety::check_command(command)?;

        let timeout = self.command_timeout(args.i64("timeout")?);
        info!(command = command, timeout_secs = timeout.as_secs(), "Running shell command");

        let output = self
            .runner
            .run(&CommandSpec::shell(command).timeout(timeout))
            .await?;

        Ok(ToolResult::text(render_command_output(command, &output)))
    }

    /// Run `spec` and turn a non-zero exit into `CommandFailed`.
    async fn run_checked(&self, spec: CommandSpec) -> Result<CommandOutput> {
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                command: spec.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Configured default timeout, at least one second.
    fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.default_timeout_secs.max(1))
    }

    /// Caller-requested timeout clamped into `1..=max_timeout_secs`.
    fn command_timeout(&self, requested: Option<i64>) -> Duration {
        let max = self.settings.max_timeout_secs.max(1);
        let secs = requested
            .map(|s| s.clamp(1, max as i64) as u64)
            .unwrap_or(self.settings.default_timeout_secs)
            .clamp(1, max);
        Duration::from_secs(secs)
    }
}

fn render_command_output(command: &str, output: &CommandOutput) -> String {
    let code = match output.code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    };

    let mut text = format!("Command: {}\nExit code: {}\n", command, code);
    if !output.stdout.is_empty() {
        text.push_str(&format!("\nStdout:\n{}", output.stdout));
    }
    if !output.stderr.is_empty() {
        text.push_str(&format!("\nStderr:\n{}", output.stderr));
    }
    text
}

pub fn docker_ps_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "docker_ps",
        "List Docker containers",
        json!({
            "type": "object",
            "properties": {
                "all": {"type": "boolean", "default": false, "description": "Include stopped containers"}
            }
        }),
    )
}

pub fn git_status_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "git_status",
        "Show the short status of a Git repository",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": ".", "description": "Repository path"}
            }
        }),
    )
}

pub fn run_command_descriptor(settings: &LocalConfig) -> ToolDescriptor {
    ToolDescriptor::new(
        "run_command",
        "Run a shell command and report its exit code, stdout and stderr",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line passed to the system shell"},
                "timeout": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": settings.max_timeout_secs,
                    "default": settings.default_timeout_secs,
                    "description": "Time limit in seconds"
                }
            },
            "required": ["command"]
        }),
    )
}

/// Every local tool descriptor, ignoring capabilities.
pub fn tool_descriptors(settings: &LocalConfig) -> Vec<ToolDescriptor> {
    vec![
        docker_ps_descriptor(),
        git_status_descriptor(),
        run_command_descriptor(settings),
    ]
}

/// Register the local tools allowed by `capabilities`.
pub fn register_tools(
    builder: ToolRegistryBuilder,
    tools: Arc<LocalTools>,
    capabilities: &Capabilities,
) -> ToolRegistryBuilder {
    let docker = tools.clone();
    let git = tools.clone();
    let shell = tools.clone();

    builder
        .register_if(
            capabilities.has("docker"),
            docker_ps_descriptor(),
            move |args: Arguments| {
                let tools = docker.clone();
                async move { tools.docker_ps(args).await }
            },
        )
        .register_if(
            capabilities.has("git"),
            git_status_descriptor(),
            move |args: Arguments| {
                let tools = git.clone();
                async move { tools.git_status(args).await }
            },
        )
        .register(
            run_command_descriptor(&tools.settings),
            move |args: Arguments| {
                let tools = shell.clone();
                async move { tools.run_command(args).await }
            },
        )
}
