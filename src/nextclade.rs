use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::CladeError;

pub const DATASET_NAME: &str = "sars-cov-2";

// Upstream does not yet publish which dataset version was current at a given
// date, so the reference dataset is pinned.
// TODO: derive the tag from tree_as_of once the dataset index exposes dates.
pub const DEFAULT_DATASET_TAG: &str = "2024-07-17--12-57-03Z";

#[derive(Clone)]
pub struct NextcladeCli {
    binary: Option<PathBuf>,
}

impl NextcladeCli {
    pub fn new() -> Self {
        Self {
            binary: find_in_path("nextclade"),
        }
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    pub fn download_dataset(&self, tag: &str, output_zip: &Path) -> Result<(), CladeError> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| CladeError::MissingTool("nextclade".to_string()))?;

        let output_zip_arg = output_zip.to_string_lossy();
        let args = [
            "dataset",
            "get",
            "--name",
            DATASET_NAME,
            "--tag",
            tag,
            "--output-zip",
            output_zip_arg.as_ref(),
        ];
        run_cmd(binary, &args)?;

        info!(tag, output_zip = %output_zip.display(), "nextclade reference dataset retrieved");
        Ok(())
    }

    pub fn version(&self) -> Option<String> {
        let binary = self.binary.as_ref()?;
        let output = Command::new(binary).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() { None } else { Some(stdout) }
    }
}

impl Default for NextcladeCli {
    fn default() -> Self {
        Self::new()
    }
}

fn run_cmd(program: &Path, args: &[&str]) -> Result<(), CladeError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| CladeError::Nextclade(err.to_string()))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("command failed: {}", program.display())
    } else {
        stderr
    };
    Err(CladeError::Nextclade(message))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
