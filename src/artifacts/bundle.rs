use super::ArtifactError;
use crate::fabric::{ItemKind, Part};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MODEL_DEFINITION_FILES: [&str; 2] = ["model.bim", "definition/model.tmdl"];
pub const REPORT_DEFINITION_FILES: [&str; 2] = ["report.json", "definition/report.json"];
pub const REPORT_LINK_FILE: &str = "definition.pbir";
pub const MODEL_MARKER_FILE: &str = "definition.pbism";
pub const PLATFORM_FILE: &str = ".platform";
const MAX_DESCRIPTION_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBundle {
    pub base_name: String,
    pub model_folder_path: PathBuf,
    pub report_folder_path: PathBuf,
    pub is_valid: bool,
    #[serde(default)]
    pub problems: Vec<String>,
}

impl ArtifactBundle {
    pub fn at(parent: &Path, base_name: &str) -> Self {
        let model_folder_path =
            parent.join(format!("{base_name}{}", ItemKind::SemanticModel.folder_suffix()));
        let report_folder_path =
            parent.join(format!("{base_name}{}", ItemKind::Report.folder_suffix()));

        let mut problems = Vec::new();
        if !model_folder_path.is_dir() {
            problems.push(format!(
                "model folder {} is missing",
                model_folder_path.display()
            ));
        } else if model_definition_file(&model_folder_path).is_none() {
            problems.push(format!(
                "model folder {} has no model definition ({})",
                model_folder_path.display(),
                MODEL_DEFINITION_FILES.join(" or ")
            ));
        }

        if !report_folder_path.is_dir() {
            problems.push(format!(
                "report folder {} is missing",
                report_folder_path.display()
            ));
        } else {
            if report_definition_file(&report_folder_path).is_none() {
                problems.push(format!(
                    "report folder {} has no report definition ({})",
                    report_folder_path.display(),
                    REPORT_DEFINITION_FILES.join(" or ")
                ));
            }
            if !report_folder_path.join(REPORT_LINK_FILE).is_file() {
                problems.push(format!(
                    "report folder {} has no {REPORT_LINK_FILE}",
                    report_folder_path.display()
                ));
            }
        }

        Self {
            base_name: base_name.to_string(),
            model_folder_path,
            report_folder_path,
            is_valid: problems.is_empty(),
            problems,
        }
    }

    pub fn ensure_valid(&self) -> Result<(), ArtifactError> {
        if self.is_valid {
            return Ok(());
        }
        Err(ArtifactError::InvalidBundle {
            base_name: self.base_name.clone(),
            reason: self.problems.join("; "),
        })
    }
}

pub fn model_definition_file(model_folder: &Path) -> Option<&'static str> {
    MODEL_DEFINITION_FILES
        .into_iter()
        .find(|relative| model_folder.join(relative).is_file())
}

pub fn report_definition_file(report_folder: &Path) -> Option<&'static str> {
    REPORT_DEFINITION_FILES
        .into_iter()
        .find(|relative| report_folder.join(relative).is_file())
}

pub fn read_parts(folder: &Path) -> Result<Vec<Part>, ArtifactError> {
    let mut parts = Vec::new();
    let walker = WalkDir::new(folder)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    for entry in walker {
        let entry = entry.map_err(|err| ArtifactError::Walk {
            path: folder.display().to_string(),
            reason: err.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(folder)
            .map_err(|err| ArtifactError::Walk {
                path: entry.path().display().to_string(),
                reason: err.to_string(),
            })?;
        let part_path = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let payload = fs::read(entry.path()).map_err(|source| ArtifactError::Io {
            path: entry.path().display().to_string(),
            source,
        })?;
        parts.push(Part::new(part_path, payload));
    }
    Ok(parts)
}

pub fn read_platform_description(folder: &Path) -> Option<String> {
    let raw = fs::read_to_string(folder.join(PLATFORM_FILE)).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let description = value
        .get("metadata")?
        .get("description")?
        .as_str()?
        .trim()
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect::<String>();
    if description.is_empty() {
        None
    } else {
        Some(description)
    }
}
