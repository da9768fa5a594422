//! CLI command execution helpers
//!
//! Wraps the built `backtrail` binary with a builder that captures output,
//! exit code and duration, and can leave a long-running `watch` in the
//! background.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct BtCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    stdin_data: Option<String>,
}

impl BtCommand {
    /// Create a new command in the given working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_backtrail")),
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            stdin_data: None,
        }
    }

    /// Add command arguments
    pub fn args<S: AsRef<str>>(&mut self, args: &[S]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Set environment variable
    #[allow(dead_code)]
    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Provide stdin data
    pub fn stdin(&mut self, data: &str) -> &mut Self {
        self.stdin_data = Some(data.to_string());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env_remove("BACKTRAIL_CONFIG")
            .env_remove("RUST_LOG")
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Start the command without waiting for it
    pub fn spawn(&self) -> Result<Child> {
        let mut child = self.command().spawn().context("Failed to spawn command")?;
        self.feed_stdin(&mut child)?;
        Ok(child)
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let mut child = self.command().spawn().context("Failed to spawn command")?;
        self.feed_stdin(&mut child)?;
        let output = child.wait_with_output().context("Failed to wait for command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Write stdin data, then close stdin so prompts see end of input
    fn feed_stdin(&self, child: &mut Child) -> Result<()> {
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(data) = &self.stdin_data {
                stdin.write_all(data.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and assert a specific exit code
    pub fn assert_exit_code(&self, expected: i32) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.exit_code != expected {
            anyhow::bail!(
                "Expected exit code {expected}, got {}:\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// Block until the child prints a stdout line containing `needle`
///
/// The rest of stdout is drained on a background thread so the child never
/// stalls on a full pipe.
pub fn wait_for_stdout(child: &mut Child, needle: &str) -> Result<()> {
    let stdout = child.stdout.take().context("stdout is not captured")?;
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            anyhow::bail!("output ended before {needle:?}");
        }
        if line.contains(needle) {
            break;
        }
    }

    std::thread::spawn(move || {
        let _ = std::io::copy(&mut reader, &mut std::io::sink());
    });
    Ok(())
}

/// Poll `check` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}

/// Command against a [`Workspace`](super::Workspace), with its private config
///
/// Usage:
/// ```ignore
/// bt!(ws, "config", "--path").assert_success()?;
/// ```
#[macro_export]
macro_rules! bt {
    ($ws:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::BtCommand::new($ws.root());
        let config = $ws.config_path();
        cmd.args(&["--config", config.to_str().unwrap()]);
        cmd.args(&[$(AsRef::<str>::as_ref(&$arg)),*]);
        cmd
    }};
}
