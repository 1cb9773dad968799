//! Headless Fiji runner.
//!
//! Stages the dedented macro into a temporary `.ijm` file and runs the Fiji launcher
//! found in the installation directory with `--headless --console --run`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use common::normalize_string::NormalizeString;

use super::{MacroArgs, MacroEngine, MacroScript};
use crate::config::PLUGINS_DIR_NAME;
use crate::error::EngineError;

/// Launcher executables relative to the installation, newest layouts last.
const LAUNCHER_CANDIDATES: &[&str] = &[
    "ImageJ-linux64",
    "ImageJ-win64.exe",
    "Contents/MacOS/ImageJ-macosx",
    "ImageJ-macosx",
    "fiji-linux-x64",
    "fiji-windows-x64.exe",
    "Contents/MacOS/fiji-macos",
];

/// Output fragments Fiji prints when a macro aborts while the process still exits 0.
const ERROR_MARKERS: &[&str] = &["Macro Error", "Unrecognized command:", "Exception in thread"];

/// Lines of engine output kept in a failure report.
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct FijiEngine {
    launcher: PathBuf,
    plugins_dir: PathBuf,
}

impl FijiEngine {
    pub fn new(launcher: impl Into<PathBuf>, fiji_dir: &Path) -> Self {
        Self {
            launcher: launcher.into(),
            plugins_dir: fiji_dir.join(PLUGINS_DIR_NAME),
        }
    }

    /// Find the launcher inside a Fiji installation.
    pub fn locate(fiji_dir: &Path) -> Result<Self, EngineError> {
        let launcher = LAUNCHER_CANDIDATES
            .iter()
            .map(|candidate| fiji_dir.join(candidate))
            .find(|path| path.is_file())
            .ok_or_else(|| EngineError::LauncherNotFound(fiji_dir.to_path_buf()))?;

        tracing::info!("Using Fiji launcher {}", launcher.display());

        Ok(Self::new(launcher, fiji_dir))
    }

    /// Use a specific launcher executable instead of the detected one.
    pub fn with_launcher(mut self, launcher: impl Into<PathBuf>) -> Self {
        self.launcher = launcher.into();
        self
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    /// Render arguments as the `key='value',...` string Fiji expects after `--run`.
    fn render_args(args: &MacroArgs) -> String {
        args.iter()
            .map(|(key, value)| format!("{}='{}'", key, value.replace('\'', "\\'")))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn stage_script(script: &MacroScript) -> Result<tempfile::NamedTempFile, EngineError> {
        let stage_err = |source| EngineError::StageScript {
            script: script.name().to_string(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}_", script.name()))
            .suffix(".ijm")
            .tempfile()
            .map_err(stage_err)?;
        file.write_all(script.source().dedent().as_bytes())
            .map_err(stage_err)?;
        file.flush().map_err(stage_err)?;

        Ok(file)
    }
}

impl MacroEngine for FijiEngine {
    fn run_macro(&self, script: &MacroScript, args: &MacroArgs) -> Result<(), EngineError> {
        let staged = Self::stage_script(script)?;

        let mut cmd = Command::new(&self.launcher);
        cmd.arg("--headless")
            .arg("--console")
            .arg(format!("-Dplugins.dir={}", self.plugins_dir.display()))
            .arg("--run")
            .arg(staged.path())
            .arg(Self::render_args(args));

        tracing::info!("Running macro '{}'", script.name());
        tracing::debug!("Command: {:?}", cmd);

        let output = cmd.output().map_err(|source| EngineError::Launch {
            launcher: self.launcher.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}{}", stdout, stderr);
        let marker = ERROR_MARKERS.iter().find(|m| combined.contains(*m));

        if !output.status.success() || marker.is_some() {
            let tail = output_tail(&combined, OUTPUT_TAIL_LINES);
            tracing::error!(
                "Macro '{}' failed with {}:\n{}",
                script.name(),
                output.status,
                tail
            );
            return Err(EngineError::script_failed(script.name(), output.status, tail));
        }

        tracing::debug!("Macro '{}' output:\n{}", script.name(), stdout);
        Ok(())
    }
}

fn output_tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
