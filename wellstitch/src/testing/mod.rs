//! Testing utilities for wellstitch.

#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::{StitchConfig, StitchParams, PLUGINS_DIR_NAME};
use crate::engine::{MacroArgs, MacroEngine, MacroScript};
use crate::error::EngineError;
use crate::stitch::{FIRST_PASS_SCRIPT, MERGE_PATH_SEPARATOR, MERGE_SCRIPT, REPLAY_SCRIPT};

pub use common::log_setup::init_test_tracing as init_tracing;

/// One macro submission seen by [`RecordingEngine`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub script: String,
    pub args: MacroArgs,
    /// Registered layout found in `orgDir` when the call was made.
    pub registered_layout: Option<Vec<u8>>,
}

impl RecordedCall {
    pub fn arg(&self, key: &str) -> &str {
        self.args.get(key).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    /// The engine ran and reported failure.
    Script,
    /// The engine could not be started.
    Launch,
}

#[derive(Debug, Clone)]
struct Failure {
    script: String,
    well: String,
    kind: FailureKind,
}

/// Engine double that records every request and emulates the files the real
/// engine writes: layout tables, fused images and the merged stack.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Vec<Failure>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a failed macro for `script` on `well`.
    pub fn fail_script(mut self, script: &str, well: &str) -> Self {
        self.failures.push(Failure {
            script: script.to_string(),
            well: well.to_string(),
            kind: FailureKind::Script,
        });
        self
    }

    /// Fail to launch the engine for `script` on `well`.
    pub fn fail_launch(mut self, script: &str, well: &str) -> Self {
        self.failures.push(Failure {
            script: script.to_string(),
            well: well.to_string(),
            kind: FailureKind::Launch,
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn script_names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.script.clone()).collect()
    }

    pub fn calls_for_well(&self, well: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.arg("wellName") == well)
            .cloned()
            .collect()
    }

    fn emulate(&self, script: &str, args: &MacroArgs) -> io::Result<()> {
        let get = |key: &str| args.get(key).unwrap_or_default();
        let params = StitchParams::default();

        match script {
            FIRST_PASS_SCRIPT => {
                let org_dir = Path::new(get("orgDir"));
                fs::write(
                    org_dir.join(&params.layout_file),
                    layout_table(get("wellName"), false),
                )?;
                fs::write(
                    org_dir.join(&params.registered_layout_file),
                    layout_table(get("wellName"), true),
                )?;
                write_fused(args)
            }
            REPLAY_SCRIPT => {
                let layout = Path::new(get("orgDir")).join(&params.registered_layout_file);
                if !layout.is_file() {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "no layout file"));
                }
                write_fused(args)
            }
            MERGE_SCRIPT => {
                let images: Vec<&str> = get("imagePaths").split(MERGE_PATH_SEPARATOR).collect();
                if let Some(missing) = images.iter().find(|image| !Path::new(image).is_file()) {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("no image {}", missing),
                    ));
                }
                fs::write(
                    Path::new(get("saveDir")).join(format!("{}.tif", get("wellName"))),
                    images.join("\n"),
                )
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown script {}", other),
            )),
        }
    }
}

fn write_fused(args: &MacroArgs) -> io::Result<()> {
    let get = |key: &str| args.get(key).unwrap_or_default();
    fs::write(
        Path::new(get("saveDir")).join(format!("{}_{}.tif", get("wellName"), get("chName"))),
        format!("fused {}", get("chName")),
    )
}

fn layout_table(well: &str, registered: bool) -> String {
    let mut table = String::from("# Define the number of dimensions we are working on\ndim = 2\n\n");
    for i in 1..=9u32 {
        let (x, y) = if registered {
            (f64::from((i - 1) % 3) * 972.4, f64::from((i - 1) / 3) * 971.9)
        } else {
            (f64::from((i - 1) % 3) * 972.8, f64::from((i - 1) / 3) * 972.8)
        };
        table.push_str(&format!("{}f{:02}.tif; ; ({:.1}, {:.1})\n", well, i, x, y));
    }
    table
}

impl MacroEngine for RecordingEngine {
    fn run_macro(&self, script: &MacroScript, args: &MacroArgs) -> Result<(), EngineError> {
        let registered_layout = args.get("orgDir").and_then(|dir| {
            fs::read(Path::new(dir).join(StitchParams::default().registered_layout_file)).ok()
        });
        self.calls.lock().push(RecordedCall {
            script: script.name().to_string(),
            args: args.clone(),
            registered_layout,
        });

        let well = args.get("wellName").unwrap_or_default();
        let failure = self
            .failures
            .iter()
            .find(|f| f.script == script.name() && f.well == well);
        match failure.map(|f| f.kind) {
            Some(FailureKind::Script) => {
                return Err(EngineError::ScriptFailed {
                    script: script.name().to_string(),
                    status: "exit status: 1".to_string(),
                    output: "Macro Error".to_string(),
                })
            }
            Some(FailureKind::Launch) => {
                return Err(EngineError::Launch {
                    launcher: PathBuf::from("ImageJ-linux64"),
                    source: io::Error::new(io::ErrorKind::NotFound, "launcher vanished"),
                })
            }
            None => {}
        }

        self.emulate(script.name(), args)
            .map_err(|e| EngineError::ScriptFailed {
                script: script.name().to_string(),
                status: "exit status: 1".to_string(),
                output: e.to_string(),
            })
    }
}

/// Builds a measurement directory tree for tests.
#[derive(Debug)]
pub struct MeasurementFixture {
    pub root: tempfile::TempDir,
}

impl MeasurementFixture {
    pub fn new() -> Self {
        let root = tempfile::TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(root.path().join("Fiji.app").join(PLUGINS_DIR_NAME))
            .expect("Failed to create Fiji.app");
        fs::create_dir_all(root.path().join("measurement"))
            .expect("Failed to create measurement dir");
        Self { root }
    }

    pub fn measurement_dir(&self) -> PathBuf {
        self.root.path().join("measurement")
    }

    pub fn fiji_dir(&self) -> PathBuf {
        self.root.path().join("Fiji.app")
    }

    pub fn well_dir(&self, well: &str) -> PathBuf {
        self.measurement_dir().join(well)
    }

    /// Adds a well with the given channel directories, each holding nine tiles.
    pub fn add_well(&self, well: &str, channels: &[&str]) -> PathBuf {
        let well_dir = self.well_dir(well);
        for channel in channels {
            let dir = well_dir.join(channel);
            fs::create_dir_all(&dir).expect("Failed to create channel dir");
            for i in 1..=9 {
                let name = format!("r01c01f{:02}.tiff", i);
                fs::write(dir.join(&name), format!("{} {}", channel, name))
                    .expect("Failed to write tile");
            }
        }
        well_dir
    }

    pub fn config(&self, reference_channel: u32) -> StitchConfig {
        StitchConfig::builder(self.measurement_dir(), reference_channel, self.fiji_dir())
            .build()
            .expect("fixture config is valid")
    }
}
