use super::publish::{ItemPublisher, PublishAction};
use super::result::fingerprint_parts;
use super::{DeploymentContext, DeploymentError};
use crate::artifacts::{read_parts, read_platform_description, ArtifactBundle, REPORT_LINK_FILE};
use crate::fabric::{CreateItemRequest, FabricApi, ItemDefinition, ItemKind};
use crate::rewrite::rewrite_dataset_reference;
use crate::shared::atomic_write_file;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedReport {
    pub remote_id: String,
    pub display_name: String,
    pub bound_model_id: String,
    pub action: PublishAction,
    pub digest: String,
    pub warnings: Vec<String>,
}

pub struct ReportPublisher<'a> {
    api: &'a dyn FabricApi,
}

impl<'a> ReportPublisher<'a> {
    pub fn new(api: &'a dyn FabricApi) -> Self {
        Self { api }
    }

    pub fn publish(
        &self,
        ctx: &DeploymentContext,
        bundle: &ArtifactBundle,
        display_name: &str,
        model_id: &str,
    ) -> Result<PublishedReport, DeploymentError> {
        let definition = prepare_report_definition(ctx, bundle, model_id)?;
        let digest = fingerprint_parts(&definition.parts);
        let request = CreateItemRequest {
            display_name: display_name.to_string(),
            description: read_platform_description(&bundle.report_folder_path),
            definition,
        };
        let published =
            ItemPublisher::new(self.api, ctx, ItemKind::Report).create_or_update(&request)?;

        let mut warnings = Vec::new();
        match self
            .api
            .rebind_report(&ctx.token, &ctx.workspace_id, &published.remote_id, model_id)
        {
            Ok(()) => ctx.log.info(
                "report.rebind",
                &format!("report `{display_name}` rebound to model {model_id}"),
            ),
            Err(err) => {
                let warning = format!("rebind of report `{display_name}` failed: {err}");
                ctx.log.warn("report.rebind", &warning);
                warnings.push(warning);
            }
        }

        Ok(PublishedReport {
            remote_id: published.remote_id,
            display_name: published.display_name,
            bound_model_id: model_id.to_string(),
            action: published.action,
            digest,
            warnings,
        })
    }
}

pub fn prepare_report_definition(
    ctx: &DeploymentContext,
    bundle: &ArtifactBundle,
    model_id: &str,
) -> Result<ItemDefinition, DeploymentError> {
    let invalid = |reason: String| DeploymentError::InvalidBundle {
        base_name: bundle.base_name.clone(),
        reason,
    };
    bundle
        .ensure_valid()
        .map_err(|err| DeploymentError::invalid_bundle(&bundle.base_name, err))?;

    let mut definition = ItemDefinition::new(
        read_parts(&bundle.report_folder_path).map_err(|err| invalid(err.to_string()))?,
    );
    let link = definition
        .part_mut(REPORT_LINK_FILE)
        .ok_or_else(|| invalid(format!("{REPORT_LINK_FILE} is missing")))?;
    let original = link
        .text()
        .ok_or_else(|| invalid(format!("{REPORT_LINK_FILE} is not valid utf-8")))?;
    let rewritten = rewrite_dataset_reference(original, model_id)
        .map_err(|err| invalid(format!("{REPORT_LINK_FILE}: {err}")))?;

    if ctx.options.write_back_definitions && rewritten != original {
        let path = bundle.report_folder_path.join(REPORT_LINK_FILE);
        atomic_write_file(&path, rewritten.as_bytes()).map_err(|source| DeploymentError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    link.payload = rewritten.into_bytes();
    Ok(definition)
}
