use crate::app::command_support::{expect_args, load_config};
use crate::artifacts::{discover_bundles, ArtifactBundle};
use crate::shared::DeployLog;

pub fn cmd_discover(args: &[String]) -> Result<String, String> {
    let args = expect_args(args, 1, "fabric-deploy discover <config.yaml>")?;
    let config = load_config(&args[0])?;
    let bundles = discover_bundles(
        &config.artifact_roots,
        &config.deployment.candidate_folders,
        &DeployLog::new(&config.state_dir()),
    )
    .map_err(|err| err.to_string())?;
    if bundles.is_empty() {
        return Err("no artifact bundles found".to_string());
    }
    Ok(render_bundles(&bundles))
}

pub fn render_bundles(bundles: &[ArtifactBundle]) -> String {
    let mut lines = Vec::with_capacity(bundles.len() + 1);
    for bundle in bundles {
        if bundle.is_valid {
            lines.push(format!(
                "{}  valid  model={} report={}",
                bundle.base_name,
                bundle.model_folder_path.display(),
                bundle.report_folder_path.display()
            ));
        } else {
            lines.push(format!(
                "{}  invalid  {}",
                bundle.base_name,
                bundle.problems.join("; ")
            ));
        }
    }
    let valid = bundles.iter().filter(|bundle| bundle.is_valid).count();
    lines.push(format!("{valid}/{} bundle(s) valid", bundles.len()));
    lines.join("\n")
}
