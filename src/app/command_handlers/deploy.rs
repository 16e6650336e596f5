use crate::app::command_support::{expect_args, load_config, map_config_err, now_secs};
use crate::auth::{AccessToken, TokenProvider};
use crate::config::DeployConfig;
use crate::deploy::{prepare_run, DeploymentError, DeploymentOrchestrator, RunStore, RunSummary};
use crate::fabric::{FabricApi, HttpFabricClient};
use crate::shared::{generate_run_id, DeployLog};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug)]
pub struct DeploymentOutcome {
    pub summary: RunSummary,
    pub summary_path: Option<PathBuf>,
}

impl DeploymentOutcome {
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .summary
            .results
            .iter()
            .map(|result| result.status_line())
            .collect();
        lines.push(String::new());
        lines.push(self.summary.render_table());
        if let Some(path) = &self.summary_path {
            lines.push(format!("run record: {}", path.display()));
        }
        lines.join("\n")
    }

    /// Rendered summary, as an error when any bundle failed so the process exits non-zero.
    pub fn into_exit_result(self) -> Result<String, String> {
        let rendered = self.render();
        if self.summary.all_succeeded() {
            Ok(rendered)
        } else {
            Err(rendered)
        }
    }
}

pub fn cmd_deploy(args: &[String]) -> Result<String, String> {
    let args = expect_args(args, 2, "fabric-deploy deploy <env> <config.yaml>")?;
    let config = load_config(&args[1])?;
    config.environment(&args[0]).map_err(map_config_err)?;
    let log = DeployLog::new(&config.state_dir());
    let credentials = config.credentials().map_err(map_config_err)?;

    let timeout = Duration::from_secs(config.api.request_timeout_seconds);
    let token = TokenProvider::new(&config.api.authority, timeout)
        .acquire_token(&credentials, &log)
        .map_err(|err| preflight_failure(&log, DeploymentError::from(err)))?;
    let client = HttpFabricClient::new(
        &config.api,
        Duration::from_secs(config.deployment.operation_max_wait_seconds),
    );
    let run_id = generate_run_id(now_secs())?;

    execute_deployment(&client, &config, &args[0], token, log.clone(), &run_id)
        .map_err(|err| preflight_failure(&log, err))?
        .into_exit_result()
}

pub fn execute_deployment(
    api: &dyn FabricApi,
    config: &DeployConfig,
    environment: &str,
    token: AccessToken,
    log: DeployLog,
    run_id: &str,
) -> Result<DeploymentOutcome, DeploymentError> {
    let prepared = prepare_run(api, config, environment, token, log.clone())?;
    log.info(
        "run.start",
        &format!(
            "run {run_id} deploying {} bundle(s) to `{}`",
            prepared.bundles.len(),
            prepared.context.environment
        ),
    );
    let summary =
        DeploymentOrchestrator::new(api).run(&prepared.context, &prepared.bundles, run_id);
    let summary_path = match RunStore::new(config.state_dir()).persist(&summary) {
        Ok(path) => Some(path),
        Err(err) => {
            log.warn("run.record", &format!("failed to write run record: {err}"));
            None
        }
    };
    Ok(DeploymentOutcome {
        summary,
        summary_path,
    })
}

fn preflight_failure(log: &DeployLog, err: DeploymentError) -> String {
    log.error("preflight.failed", &err.to_string());
    format!("pre-flight failed: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeploymentResult;
    use chrono::Utc;

    fn outcome(results: &[(&str, bool)]) -> DeploymentOutcome {
        let results = results
            .iter()
            .map(|(name, success)| {
                let mut result = DeploymentResult::started(name);
                result.success = *success;
                if !success {
                    result.error_message = Some("report folder missing".to_string());
                }
                result
            })
            .collect();
        DeploymentOutcome {
            summary: RunSummary::from_results("run-1", "Test", "ws-1", Utc::now(), results),
            summary_path: None,
        }
    }

    #[test]
    fn any_failed_bundle_makes_the_run_an_error() {
        let rendered = outcome(&[("Sales", true), ("Marketing", false)])
            .into_exit_result()
            .expect_err("failed bundle");
        assert!(rendered.contains("[SUCCESS] Sales"), "{rendered}");
        assert!(rendered.contains("[FAILED] Marketing"), "{rendered}");
    }

    #[test]
    fn all_succeeded_is_ok() {
        let rendered = outcome(&[("Sales", true)])
            .into_exit_result()
            .expect("all succeeded");
        assert!(rendered.contains("[SUCCESS] Sales"));
    }
}
