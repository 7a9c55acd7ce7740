//! External command execution.
//!
//! Everything that shells out (tar, drush, composer) goes through
//! [`CommandRunner`]: an argument vector goes in, an exit status and the
//! captured output come out. Arguments are never interpolated into a shell
//! string, so paths with spaces or quotes are passed through untouched.

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use std::process::{Command, Stdio};

/// Result of a finished child process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait CommandRunner {
    /// Run `program` with `args`, blocking until it exits.
    fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput>;

    /// Whether `program` can be launched at all.
    fn command_exists(&self, program: &str) -> bool;

    /// Run and turn a non-zero exit status into an error carrying stderr.
    fn run_checked(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput> {
        let output = self.run(program, args, cwd)?;
        if !output.success() {
            let code = output
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(anyhow::anyhow!(
                "Command '{}' failed (exit status {}):\n{}",
                program,
                code,
                output.stderr.trim()
            ));
        }
        Ok(output)
    }
}

/// Runs commands on the host system.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    verbose: bool,
}

impl Shell {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl CommandRunner for Shell {
    fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        if self.verbose {
            println!("   {} {} {}", "$".dimmed(), program, args.join(" "));
        }

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute {}", program))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if self.verbose {
            if !result.stdout.trim().is_empty() {
                println!("{}", result.stdout.trim_end());
            }
            if !result.stderr.trim().is_empty() {
                eprintln!("{}", result.stderr.trim_end());
            }
        }

        Ok(result)
    }

    fn command_exists(&self, program: &str) -> bool {
        Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }
}
