//! Host capabilities the front end depends on
//!
//! Choosing directories, persisting configuration and registering a login
//! item differ per host. Commands call them through these traits.

use anyhow::{Context, Result};
use backtrail_core::config::config_file_path;
use backtrail_core::{Config, ConfigError};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Lets the user choose a directory
pub trait DirectoryPicker {
    /// `current` is offered as the default; `None` means the user gave up
    fn pick(&mut self, prompt: &str, current: Option<&Path>) -> Result<Option<PathBuf>>;
}

/// Loads and saves the persistent configuration
pub trait ConfigStore {
    fn load(&self) -> Result<Config, ConfigError>;
    fn persist(&self, config: &Config) -> Result<(), ConfigError>;
    /// Human-readable location of the stored configuration
    fn location(&self) -> &Path;
}

/// Starts `backtrail watch` when the user logs in
pub trait AutoStart {
    /// Register the login item; returns where it was installed
    fn register(&self) -> Result<PathBuf>;
    fn is_registered(&self) -> bool;
}

/// Directory prompt on a terminal
pub struct TerminalPicker<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPicker<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> DirectoryPicker for TerminalPicker<R, W> {
    fn pick(&mut self, prompt: &str, current: Option<&Path>) -> Result<Option<PathBuf>> {
        match current {
            Some(current) => write!(self.output, "{prompt} [{}]: ", current.display())?,
            None => write!(self.output, "{prompt}: ")?,
        }
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let answer = line.trim();
        if answer.is_empty() {
            return Ok(current.map(Path::to_path_buf));
        }
        Ok(Some(expand_home(answer)))
    }
}

/// `~/x` → `<home>/x`
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// TOML configuration file
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform's configuration directory
    pub fn default_location() -> Result<Self, ConfigError> {
        Ok(Self::new(config_file_path()?))
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from(&self.path)
    }

    fn persist(&self, config: &Config) -> Result<(), ConfigError> {
        config.save_to(&self.path)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// XDG autostart entry (`<config dir>/autostart/backtrail.desktop`)
pub struct DesktopEntryAutoStart {
    entry_path: PathBuf,
    executable: PathBuf,
    config_path: PathBuf,
}

impl DesktopEntryAutoStart {
    pub fn new(autostart_dir: &Path, executable: PathBuf, config_path: PathBuf) -> Self {
        Self {
            entry_path: autostart_dir.join("backtrail.desktop"),
            executable,
            config_path,
        }
    }

    fn entry(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=backtrail\n\
             Comment=Mirror a directory into a git snapshot history\n\
             Exec=\"{}\" --config \"{}\" watch --yes\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            self.executable.display(),
            self.config_path.display()
        )
    }
}

impl AutoStart for DesktopEntryAutoStart {
    fn register(&self) -> Result<PathBuf> {
        if let Some(dir) = self.entry_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        std::fs::write(&self.entry_path, self.entry())
            .with_context(|| format!("Failed to write {}", self.entry_path.display()))?;
        Ok(self.entry_path.clone())
    }

    fn is_registered(&self) -> bool {
        self.entry_path.is_file()
    }
}

/// Login-item support for this platform, if any
pub fn platform_autostart(config_path: &Path) -> Result<Option<Box<dyn AutoStart>>> {
    if !cfg!(any(target_os = "linux", target_os = "freebsd", target_os = "openbsd")) {
        return Ok(None);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(None);
    };
    let executable = std::env::current_exe().context("Failed to locate the backtrail executable")?;

    Ok(Some(Box::new(DesktopEntryAutoStart::new(
        &config_dir.join("autostart"),
        executable,
        config_path.to_path_buf(),
    ))))
}
