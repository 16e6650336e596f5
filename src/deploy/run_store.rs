use super::result::RunSummary;
use super::DeploymentError;
use crate::shared::atomic_write_file;
use std::fs;
use std::path::{Path, PathBuf};

pub struct RunStore {
    state_root: PathBuf,
}

impl RunStore {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn summary_path(&self, run_id: &str) -> PathBuf {
        self.state_root.join("runs").join(format!("{run_id}.json"))
    }

    pub fn persist(&self, summary: &RunSummary) -> Result<PathBuf, DeploymentError> {
        let path = self.summary_path(&summary.run_id);
        let body = serde_json::to_vec_pretty(summary).map_err(|e| json_error(&path, e))?;
        atomic_write_file(&path, &body).map_err(|e| io_error(&path, e))?;
        Ok(path)
    }

    pub fn load(&self, run_id: &str) -> Result<RunSummary, DeploymentError> {
        let path = self.summary_path(run_id);
        let raw = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        serde_json::from_str(&raw).map_err(|e| json_error(&path, e))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DeploymentError {
    DeploymentError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> DeploymentError {
    DeploymentError::Json {
        path: path.display().to_string(),
        source,
    }
}
