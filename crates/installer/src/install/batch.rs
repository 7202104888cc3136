//! Elevated installer batches
//!
//! Several recognized installers that would each raise their own UAC prompt
//! are chained in one generated PowerShell script and run under a single
//! elevation. The script runs them strictly one after another with the same
//! arguments and reports the first non-zero exit code.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::core::error::{FileOperation, InstallError, Result};
use crate::integrations::launcher::ps_quote;

/// Installers to run back-to-back under one elevation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerBatch {
    pub installers: Vec<PathBuf>,
    /// Argument set shared by every installer
    pub arguments: Vec<String>,
    /// Progress log written by the script itself
    pub execution_log: PathBuf,
}

impl InstallerBatch {
    pub fn new(installers: Vec<PathBuf>, arguments: Vec<String>, execution_log: PathBuf) -> Self {
        Self {
            installers,
            arguments,
            execution_log,
        }
    }

    /// Render the PowerShell script for this batch
    pub fn render_script(&self) -> String {
        let mut script = String::new();
        script.push_str("# Generated installer batch\n");
        script.push_str("$ErrorActionPreference = 'Continue'\n");
        script.push_str(&format!(
            "$executionLog = {}\n",
            ps_quote(&self.execution_log.display().to_string())
        ));
        script.push_str("$installers = @(\n");
        let entries: Vec<String> = self
            .installers
            .iter()
            .map(|installer| format!("    {}", ps_quote(&installer.display().to_string())))
            .collect();
        script.push_str(&entries.join(",\n"));
        script.push_str("\n)\n");
        script.push_str(&format!("$arguments = {}\n", ps_quote(&self.arguments.join(" "))));
        script.push_str("$batchExit = 0\n");
        script.push_str("foreach ($installer in $installers) {\n");
        script.push_str("    Add-Content -Path $executionLog -Value \"Starting $installer\"\n");
        script.push_str("    try {\n");
        script.push_str("        $process = Start-Process -FilePath $installer -ArgumentList $arguments -Wait -PassThru\n");
        script.push_str("        $code = $process.ExitCode\n");
        script.push_str("    } catch {\n");
        script.push_str("        Add-Content -Path $executionLog -Value \"Failed to start ${installer}: $_\"\n");
        script.push_str("        $code = 1\n");
        script.push_str("    }\n");
        script.push_str("    Add-Content -Path $executionLog -Value \"Finished $installer with exit code $code\"\n");
        script.push_str("    if ($batchExit -eq 0 -and $code -ne 0) { $batchExit = $code }\n");
        script.push_str("}\n");
        script.push_str("exit $batchExit\n");
        script
    }

    /// Write the script into `dir` and return its path
    pub async fn write_script(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| InstallError::fs(dir, FileOperation::CreateDir, e))?;

        let script_path = dir.join("install-batch.ps1");
        fs::write(&script_path, self.render_script())
            .await
            .map_err(|e| InstallError::fs(&script_path, FileOperation::Write, e))?;

        debug!(
            script = %script_path.display(),
            installers = self.installers.len(),
            "wrote installer batch script"
        );
        Ok(script_path)
    }
}

/// Exit code of a batch: the first non-zero child code, zero otherwise
pub fn batch_exit_code(codes: &[i32]) -> i32 {
    codes.iter().copied().find(|code| *code != 0).unwrap_or(0)
}
