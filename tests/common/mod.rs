//! Shared helpers for driving the `penrich` binary in a scratch data dir.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Unreachable service base URL; requests fail fast with a connection error.
pub const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    /// Seed a data document directly.
    pub fn seed_document(&self, key: &str, value: &Value) {
        fs::create_dir_all(self.data_dir()).expect("create data dir");
        let text = serde_json::to_string_pretty(value).expect("serialize document");
        fs::write(self.data_dir().join(format!("{key}.json")), text).expect("write document");
    }

    /// Base command with a clean credential environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_penrich"));
        cmd.arg("--data-dir")
            .arg(self.data_dir())
            .env_remove("GEMINI_API_KEY")
            .env_remove("API_KEY")
            .env_remove("PENRICH_DATA_DIR")
            .env("PENRICH_GEMINI_ENDPOINT", DEAD_ENDPOINT)
            .env("RUST_LOG", "warn");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run penrich")
    }

    pub fn run_with_key(&self, args: &[&str]) -> Output {
        self.command()
            .env("GEMINI_API_KEY", "test-key")
            .args(args)
            .output()
            .expect("run penrich")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}\nstderr: {}",
            stdout(output),
            stderr(output)
        )
    })
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}
