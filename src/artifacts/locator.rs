use super::bundle::{ArtifactBundle, MODEL_MARKER_FILE, REPORT_LINK_FILE};
use super::ArtifactError;
use crate::fabric::ItemKind;
use crate::shared::DeployLog;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_bundles(
    roots: &[PathBuf],
    candidate_folders: &[String],
    log: &DeployLog,
) -> Result<Vec<ArtifactBundle>, ArtifactError> {
    let mut by_name: BTreeMap<String, ArtifactBundle> = BTreeMap::new();
    for root in roots {
        if !root.is_dir() {
            return Err(ArtifactError::MissingRoot {
                path: root.display().to_string(),
            });
        }
        let mut found = discover_in_candidates(root, candidate_folders)?;
        if found.is_empty() {
            found = discover_by_markers(root)?;
        }
        for bundle in found {
            match by_name.get(&bundle.base_name) {
                Some(kept) => log.warn(
                    "discover.duplicate",
                    &format!(
                        "bundle `{}` at {} ignored; already found at {}",
                        bundle.base_name,
                        bundle.model_folder_path.display(),
                        kept.model_folder_path.display()
                    ),
                ),
                None => {
                    by_name.insert(bundle.base_name.clone(), bundle);
                }
            }
        }
    }
    Ok(by_name.into_values().collect())
}

pub fn validate_bundle(path: &Path) -> Result<ArtifactBundle, ArtifactError> {
    let unrecognized = || ArtifactError::UnrecognizedFolder {
        path: path.display().to_string(),
    };
    let name = path
        .file_name()
        .and_then(|v| v.to_str())
        .ok_or_else(unrecognized)?;
    let base_name = strip_kind_suffix(name).ok_or_else(unrecognized)?;
    let parent = path.parent().ok_or_else(unrecognized)?;
    Ok(ArtifactBundle::at(parent, base_name))
}

fn strip_kind_suffix(folder_name: &str) -> Option<&str> {
    [ItemKind::SemanticModel, ItemKind::Report]
        .into_iter()
        .find_map(|kind| folder_name.strip_suffix(kind.folder_suffix()))
        .filter(|base| !base.trim().is_empty())
}

fn discover_in_candidates(
    root: &Path,
    candidate_folders: &[String],
) -> Result<Vec<ArtifactBundle>, ArtifactError> {
    let mut candidates: Vec<PathBuf> = candidate_folders
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| root.join(name.trim()))
        .collect();
    candidates.push(root.to_path_buf());

    for candidate in candidates {
        if !candidate.is_dir() {
            continue;
        }
        let base_names = immediate_base_names(&candidate)?;
        if !base_names.is_empty() {
            return Ok(base_names
                .iter()
                .map(|base| ArtifactBundle::at(&candidate, base))
                .collect());
        }
    }
    Ok(Vec::new())
}

fn immediate_base_names(dir: &Path) -> Result<BTreeSet<String>, ArtifactError> {
    let entries = fs::read_dir(dir).map_err(|source| ArtifactError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| ArtifactError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        if let Some(base) = file_name.to_str().and_then(strip_kind_suffix) {
            names.insert(base.to_string());
        }
    }
    Ok(names)
}

fn discover_by_markers(root: &Path) -> Result<Vec<ArtifactBundle>, ArtifactError> {
    let mut located: BTreeSet<(PathBuf, String)> = BTreeSet::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| ArtifactError::Walk {
            path: root.display().to_string(),
            reason: err.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if file_name != MODEL_MARKER_FILE && file_name != REPORT_LINK_FILE {
            continue;
        }
        let Some(folder) = entry.path().parent() else {
            continue;
        };
        let Some(base) = folder
            .file_name()
            .and_then(|v| v.to_str())
            .and_then(strip_kind_suffix)
        else {
            continue;
        };
        if let Some(parent) = folder.parent() {
            located.insert((parent.to_path_buf(), base.to_string()));
        }
    }
    Ok(located
        .into_iter()
        .map(|(parent, base)| ArtifactBundle::at(&parent, &base))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(path, content).expect("write file");
    }

    fn complete_bundle(dir: &Path, base: &str) {
        write(&dir.join(format!("{base}.SemanticModel/model.bim")), "{}");
        write(&dir.join(format!("{base}.SemanticModel/definition.pbism")), "{}");
        write(&dir.join(format!("{base}.Report/report.json")), "{}");
        write(&dir.join(format!("{base}.Report/definition.pbir")), "{}");
    }

    #[test]
    fn preferred_candidate_folder_wins() {
        let temp = tempdir().expect("tempdir");
        complete_bundle(&temp.path().join("PowerBI"), "Sales");
        complete_bundle(&temp.path().join("nested/deeper"), "Ignored");

        let bundles = discover_bundles(
            &[temp.path().to_path_buf()],
            &["PowerBI".to_string()],
            &DeployLog::silent(),
        )
        .expect("discover");
        let names: Vec<&str> = bundles.iter().map(|b| b.base_name.as_str()).collect();
        assert_eq!(names, vec!["Sales"]);
        assert!(bundles[0].is_valid);
    }

    #[test]
    fn falls_back_to_recursive_marker_scan() {
        let temp = tempdir().expect("tempdir");
        complete_bundle(&temp.path().join("team/finance"), "Budget");
        write(
            &temp.path().join("team/ops/Marketing.SemanticModel/model.bim"),
            "{}",
        );
        write(
            &temp
                .path()
                .join("team/ops/Marketing.SemanticModel/definition.pbism"),
            "{}",
        );

        let bundles = discover_bundles(
            &[temp.path().to_path_buf()],
            &["PowerBI".to_string()],
            &DeployLog::silent(),
        )
        .expect("discover");
        let names: Vec<&str> = bundles.iter().map(|b| b.base_name.as_str()).collect();
        assert_eq!(names, vec!["Budget", "Marketing"]);
        assert!(bundles[0].is_valid);
        assert!(!bundles[1].is_valid);
        assert!(bundles[1].problems[0].contains("report folder"));
    }

    #[test]
    fn returned_bundles_are_only_marked_valid_when_parts_exist() {
        let temp = tempdir().expect("tempdir");
        complete_bundle(temp.path(), "Sales");
        write(&temp.path().join("Marketing.SemanticModel/model.bim"), "{}");
        write(&temp.path().join("Orders.Report/report.json"), "{}");

        let bundles = discover_bundles(&[temp.path().to_path_buf()], &[], &DeployLog::silent())
            .expect("discover");
        assert_eq!(bundles.len(), 3);
        for bundle in &bundles {
            let model_ok = bundle.model_folder_path.join("model.bim").is_file();
            let report_ok = bundle.report_folder_path.join("report.json").is_file()
                && bundle.report_folder_path.join("definition.pbir").is_file();
            assert_eq!(bundle.is_valid, model_ok && report_ok, "{}", bundle.base_name);
        }
    }

    #[test]
    fn duplicate_base_names_across_roots_keep_first_root() {
        let first = tempdir().expect("tempdir");
        let second = tempdir().expect("tempdir");
        complete_bundle(first.path(), "Sales");
        complete_bundle(second.path(), "Sales");

        let bundles = discover_bundles(
            &[first.path().to_path_buf(), second.path().to_path_buf()],
            &[],
            &DeployLog::silent(),
        )
        .expect("discover");
        assert_eq!(bundles.len(), 1);
        assert!(bundles[0].model_folder_path.starts_with(first.path()));
    }

    #[test]
    fn duplicate_base_name_in_fallback_scan_is_logged() {
        let temp = tempdir().expect("tempdir");
        let artifacts = temp.path().join("artifacts");
        complete_bundle(&artifacts.join("team/a"), "Sales");
        complete_bundle(&artifacts.join("team/b"), "Sales");
        let log = DeployLog::new(&temp.path().join("state")).with_echo(false);

        let bundles = discover_bundles(&[artifacts.clone()], &[], &log).expect("discover");
        assert_eq!(bundles.len(), 1);
        assert!(bundles[0].model_folder_path.starts_with(artifacts.join("team/a")));

        let written =
            fs::read_to_string(log.path().expect("log path")).expect("read deploy log");
        assert!(written.contains("discover.duplicate"), "{written}");
        assert!(written.contains("team/b"), "{written}");
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let err = discover_bundles(&[temp.path().join("absent")], &[], &DeployLog::silent())
            .expect_err("missing");
        assert!(matches!(err, ArtifactError::MissingRoot { .. }));
    }

    #[test]
    fn validate_bundle_accepts_either_sub_folder() {
        let temp = tempdir().expect("tempdir");
        complete_bundle(temp.path(), "Sales");

        let from_model =
            validate_bundle(&temp.path().join("Sales.SemanticModel")).expect("model path");
        let from_report = validate_bundle(&temp.path().join("Sales.Report")).expect("report path");
        assert_eq!(from_model, from_report);
        assert!(from_model.is_valid);

        let err = validate_bundle(&temp.path().join("Sales")).expect_err("no suffix");
        assert!(matches!(err, ArtifactError::UnrecognizedFolder { .. }));
    }
}
