//! Installer process launching
//!
//! Installers are awaited to completion and never killed: a half-finished
//! installer leaves the target directory in an unknown state.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::error::{InstallError, Result};

/// How a single installer is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Recognized installer with silent flags, elevated up front
    Silent,
    /// Started through the desktop shell for the operator to drive
    Interactive,
}

/// Trait for starting installer processes
#[async_trait]
pub trait InstallerLauncher: Send + Sync {
    /// Run one installer and wait for it, returning its exit code
    async fn launch(&self, program: &Path, args: &[String], mode: LaunchMode) -> Result<i32>;

    /// Run a generated batch script under a single elevation prompt
    async fn run_elevated_script(&self, script: &Path) -> Result<i32>;
}

/// Launcher that goes through PowerShell `Start-Process` on Windows
///
/// Elsewhere the program is executed directly, which is mostly useful for
/// compatibility layers and tests.
#[derive(Debug, Clone, Default)]
pub struct ShellLauncher;

/// Quote a string as a PowerShell single-quoted literal
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl ShellLauncher {
    fn start_process_command(program: &Path, args: &[String], elevate: bool) -> String {
        let mut command = format!(
            "$p = Start-Process -FilePath {} -Wait -PassThru",
            ps_quote(&program.display().to_string())
        );
        if !args.is_empty() {
            command.push_str(&format!(" -ArgumentList {}", ps_quote(&args.join(" "))));
        }
        if let Some(dir) = program.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.push_str(&format!(" -WorkingDirectory {}", ps_quote(&dir.display().to_string())));
        }
        if elevate {
            command.push_str(" -Verb RunAs");
        }
        command.push_str("; exit $p.ExitCode");
        command
    }

    async fn run(program: &Path, command: &mut Command) -> Result<i32> {
        let status = command.status().await.map_err(|e| InstallError::Launch {
            program: program.to_path_buf(),
            source: e,
        })?;
        let code = status.code().unwrap_or(-1);
        debug!(program = %program.display(), code, "process exited");
        Ok(code)
    }
}

#[async_trait]
impl InstallerLauncher for ShellLauncher {
    async fn launch(&self, program: &Path, args: &[String], mode: LaunchMode) -> Result<i32> {
        info!(program = %program.display(), ?mode, "launching installer");

        if cfg!(windows) {
            let script = Self::start_process_command(program, args, mode == LaunchMode::Silent);
            let mut command = Command::new("powershell.exe");
            command.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", &script]);
            Self::run(program, &mut command).await
        } else {
            let mut command = Command::new(program);
            command.args(args);
            if let Some(dir) = program.parent().filter(|d| !d.as_os_str().is_empty()) {
                command.current_dir(dir);
            }
            Self::run(program, &mut command).await
        }
    }

    async fn run_elevated_script(&self, script: &Path) -> Result<i32> {
        info!(script = %script.display(), "running elevated installer batch");

        if cfg!(windows) {
            let inner = format!(
                "-NoProfile -ExecutionPolicy Bypass -File \"{}\"",
                script.display()
            );
            let command_text = format!(
                "$p = Start-Process -FilePath 'powershell.exe' -ArgumentList {} -Verb RunAs -Wait -PassThru; exit $p.ExitCode",
                ps_quote(&inner)
            );
            let mut command = Command::new("powershell.exe");
            command.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", &command_text]);
            Self::run(script, &mut command).await
        } else {
            let mut command = Command::new("pwsh");
            command.args(["-NoProfile", "-File"]).arg(script);
            Self::run(script, &mut command).await
        }
    }
}
