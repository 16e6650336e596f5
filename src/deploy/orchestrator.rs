use super::model_publisher::{ModelPublisher, PublishedModel};
use super::poller::DeploymentPoller;
use super::report_publisher::{PublishedReport, ReportPublisher};
use super::result::{DeploymentResult, DeploymentStep, RunSummary};
use super::workspace::WorkspaceResolver;
use super::{DeploymentContext, DeploymentError};
use crate::artifacts::{discover_bundles, ArtifactBundle};
use crate::auth::AccessToken;
use crate::config::DeployConfig;
use crate::fabric::{display_names_match, FabricApi, ItemKind};
use crate::shared::DeployLog;
use chrono::Utc;

#[derive(Debug, Default)]
struct BundleProgress {
    model: Option<PublishedModel>,
    report: Option<PublishedReport>,
    warnings: Vec<String>,
}

#[derive(Debug)]
pub struct PreparedRun {
    pub context: DeploymentContext,
    pub bundles: Vec<ArtifactBundle>,
}

pub fn prepare_run(
    api: &dyn FabricApi,
    config: &DeployConfig,
    environment_label: &str,
    token: AccessToken,
    log: DeployLog,
) -> Result<PreparedRun, DeploymentError> {
    let (environment_name, environment) = config.environment(environment_label)?;
    let resolver = WorkspaceResolver::new(api);
    let workspace_id = resolver.resolve_workspace_id(&token, environment)?;
    let workspace = resolver.verify_access(&token, &workspace_id)?;
    log.info(
        "preflight.workspace",
        &format!(
            "environment `{environment_name}` targets workspace `{}` ({workspace_id})",
            workspace.display_name
        ),
    );

    let bundles = discover_bundles(
        &config.artifact_roots,
        &config.deployment.candidate_folders,
        &log,
    )?;
    if bundles.is_empty() {
        return Err(DeploymentError::NoBundles {
            roots: config
                .artifact_roots
                .iter()
                .map(|root| root.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    log.info(
        "preflight.bundles",
        &format!(
            "discovered {} bundle(s): {}",
            bundles.len(),
            bundles
                .iter()
                .map(|bundle| bundle.base_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    );

    let context = DeploymentContext::new(
        token,
        workspace_id,
        environment_name,
        environment.warehouse.clone(),
        config.deployment.clone(),
    )
    .with_connection_name(environment.connection_name.clone())
    .with_log(log);
    Ok(PreparedRun { context, bundles })
}

pub struct DeploymentOrchestrator<'a> {
    api: &'a dyn FabricApi,
}

impl<'a> DeploymentOrchestrator<'a> {
    pub fn new(api: &'a dyn FabricApi) -> Self {
        Self { api }
    }

    pub fn run(
        &self,
        ctx: &DeploymentContext,
        bundles: &[ArtifactBundle],
        run_id: &str,
    ) -> RunSummary {
        let started_at = Utc::now();
        let results = self.deploy_all(ctx, bundles);
        let summary = RunSummary::from_results(
            run_id,
            &ctx.environment,
            &ctx.workspace_id,
            started_at,
            results,
        );
        let message = format!(
            "{}/{} bundle(s) deployed",
            summary.success_count, summary.total_count
        );
        if summary.all_succeeded() {
            ctx.log.info("run.finished", &message);
        } else {
            ctx.log.error(
                "run.finished",
                &format!("{message}; failed: {}", summary.failed_bundles().join(", ")),
            );
        }
        summary
    }

    pub fn deploy_all(
        &self,
        ctx: &DeploymentContext,
        bundles: &[ArtifactBundle],
    ) -> Vec<DeploymentResult> {
        let mut results = Vec::with_capacity(bundles.len());
        let mut abort_reason: Option<String> = None;
        for bundle in bundles {
            if let Some(reason) = &abort_reason {
                let mut skipped = DeploymentResult::started(&bundle.base_name);
                skipped.error_message = Some(format!("skipped: {reason}"));
                ctx.log
                    .error("bundle.skipped", &format!("{}: {reason}", bundle.base_name));
                results.push(skipped);
                continue;
            }
            let (result, error) = self.deploy_bundle(ctx, bundle);
            if let Some(err) = error.filter(DeploymentError::is_fatal_for_run) {
                abort_reason = Some(format!("run aborted after `{}`: {err}", bundle.base_name));
            }
            results.push(result);
        }
        results
    }

    pub fn deploy_bundle(
        &self,
        ctx: &DeploymentContext,
        bundle: &ArtifactBundle,
    ) -> (DeploymentResult, Option<DeploymentError>) {
        ctx.log
            .info("bundle.start", &format!("deploying `{}`", bundle.base_name));
        let mut result = DeploymentResult::started(&bundle.base_name);
        let mut progress = BundleProgress::default();
        let mut step = Some(DeploymentStep::VerifyWorkspaceAccess);
        let mut failure = None;

        while let Some(current) = step {
            match self.run_step(current, ctx, bundle, &mut progress) {
                Ok(()) => step = current.next(),
                Err(err) => {
                    ctx.log.error(
                        "bundle.failed",
                        &format!("`{}` failed at {current}: {err}", bundle.base_name),
                    );
                    result.failed_step = Some(current);
                    result.error_message = Some(err.to_string());
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(model) = &progress.model {
            result.model_id = Some(model.remote_id.clone());
            result.model_digest = Some(model.digest.clone());
        }
        if let Some(report) = &progress.report {
            result.report_id = Some(report.remote_id.clone());
            result.report_digest = Some(report.digest.clone());
        }
        result.warnings = progress.warnings;
        result.success = failure.is_none();
        result.timestamp = Utc::now();
        if result.success {
            ctx.log.info("bundle.success", &result.status_line());
        }
        (result, failure)
    }

    fn run_step(
        &self,
        step: DeploymentStep,
        ctx: &DeploymentContext,
        bundle: &ArtifactBundle,
        progress: &mut BundleProgress,
    ) -> Result<(), DeploymentError> {
        match step {
            DeploymentStep::VerifyWorkspaceAccess => {
                WorkspaceResolver::new(self.api).verify_access(&ctx.token, &ctx.workspace_id)?;
            }
            DeploymentStep::ValidateBundle => {
                bundle
                    .ensure_valid()
                    .map_err(|err| DeploymentError::invalid_bundle(&bundle.base_name, err))?;
            }
            DeploymentStep::PublishModel => {
                let name = ctx.options.model_display_name(&bundle.base_name);
                let model = ModelPublisher::new(self.api).publish(ctx, bundle, &name)?;
                progress.warnings.extend(model.warnings.iter().cloned());
                progress.model = Some(model);
            }
            DeploymentStep::WaitModel => {
                let name = ctx.options.model_display_name(&bundle.base_name);
                self.wait(ctx, &name, ItemKind::SemanticModel, progress);
            }
            DeploymentStep::BindConnection => {
                if let Some(warning) = self.bind_connection(ctx, progress) {
                    ctx.log.warn("bind.connection", &warning);
                    progress.warnings.push(warning);
                }
            }
            DeploymentStep::PublishReport => {
                let model_id = progress
                    .model
                    .as_ref()
                    .map(|model| model.remote_id.clone())
                    .ok_or_else(|| DeploymentError::VerificationFailed {
                        item: bundle.base_name.clone(),
                        reason: "no semantic model id available for report binding".to_string(),
                    })?;
                let name = ctx.options.report_display_name(&bundle.base_name);
                let report =
                    ReportPublisher::new(self.api).publish(ctx, bundle, &name, &model_id)?;
                progress.warnings.extend(report.warnings.iter().cloned());
                progress.report = Some(report);
            }
            DeploymentStep::WaitReport => {
                let name = ctx.options.report_display_name(&bundle.base_name);
                self.wait(ctx, &name, ItemKind::Report, progress);
            }
            DeploymentStep::VerifyFinalState => {
                if let Some(model) = &progress.model {
                    self.verify_present(
                        ctx,
                        ItemKind::SemanticModel,
                        &model.remote_id,
                        &model.display_name,
                    )?;
                }
                if let Some(report) = &progress.report {
                    self.verify_present(
                        ctx,
                        ItemKind::Report,
                        &report.remote_id,
                        &report.display_name,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn wait(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        kind: ItemKind,
        progress: &mut BundleProgress,
    ) {
        let found = DeploymentPoller::new(self.api).wait_for_item(
            ctx,
            name,
            kind,
            ctx.poll_max_wait(),
            ctx.poll_interval(),
        );
        if !found {
            progress.warnings.push(
                DeploymentError::PollTimeout {
                    item: name.to_string(),
                    kind,
                    waited_seconds: ctx.options.poll_max_wait_seconds,
                }
                .to_string(),
            );
        }
    }

    fn bind_connection(
        &self,
        ctx: &DeploymentContext,
        progress: &BundleProgress,
    ) -> Option<String> {
        let connection_name = ctx.connection_name.as_deref()?;
        let model = progress.model.as_ref()?;
        let connections = match self.api.list_connections(&ctx.token) {
            Ok(connections) => connections,
            Err(err) => return Some(format!("listing connections failed: {err}")),
        };
        let Some(connection) = connections
            .iter()
            .find(|connection| display_names_match(&connection.display_name, connection_name))
        else {
            return Some(format!("connection `{connection_name}` not found"));
        };
        match self.api.bind_semantic_model_connection(
            &ctx.token,
            &ctx.workspace_id,
            &model.remote_id,
            &connection.id,
            &ctx.target,
        ) {
            Ok(()) => {
                ctx.log.info(
                    "bind.connection",
                    &format!(
                        "model `{}` bound to connection `{connection_name}`",
                        model.display_name
                    ),
                );
                None
            }
            Err(err) => Some(format!(
                "binding model `{}` to connection `{connection_name}` failed: {err}",
                model.display_name
            )),
        }
    }

    fn verify_present(
        &self,
        ctx: &DeploymentContext,
        kind: ItemKind,
        remote_id: &str,
        display_name: &str,
    ) -> Result<(), DeploymentError> {
        let items = self
            .api
            .list_items(&ctx.token, &ctx.workspace_id, Some(kind))
            .map_err(|err| DeploymentError::VerificationFailed {
                item: display_name.to_string(),
                reason: err.to_string(),
            })?;
        if items.iter().any(|item| item.id == remote_id) {
            return Ok(());
        }
        Err(DeploymentError::VerificationFailed {
            item: display_name.to_string(),
            reason: format!(
                "{kind} {remote_id} is not listed in workspace {}",
                ctx.workspace_id
            ),
        })
    }
}
