use super::publish::{ItemPublisher, PublishAction};
use super::result::fingerprint_parts;
use super::{DeploymentContext, DeploymentError};
use crate::artifacts::{
    model_definition_file, read_parts, read_platform_description, ArtifactBundle,
};
use crate::fabric::{CreateItemRequest, FabricApi, ItemDefinition, ItemKind, Part};
use crate::rewrite::{ConnectionRewriter, DefinitionFormat};
use crate::shared::atomic_write_file;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedModel {
    pub remote_id: String,
    pub display_name: String,
    pub action: PublishAction,
    pub updated_connections: usize,
    pub digest: String,
    pub warnings: Vec<String>,
}

pub struct ModelPublisher<'a> {
    api: &'a dyn FabricApi,
}

impl<'a> ModelPublisher<'a> {
    pub fn new(api: &'a dyn FabricApi) -> Self {
        Self { api }
    }

    pub fn publish(
        &self,
        ctx: &DeploymentContext,
        bundle: &ArtifactBundle,
        display_name: &str,
    ) -> Result<PublishedModel, DeploymentError> {
        let (definition, updated_connections) = prepare_model_definition(ctx, bundle)?;
        let mut warnings = Vec::new();
        if updated_connections == 0 {
            let warning = format!(
                "no connection expressions found to rewrite in model `{}`",
                bundle.base_name
            );
            ctx.log.warn("model.rewrite", &warning);
            warnings.push(warning);
        } else {
            ctx.log.info(
                "model.rewrite",
                &format!(
                    "rewrote {updated_connections} connection(s) in `{}` to {}",
                    bundle.base_name,
                    ctx.target.connection_path()
                ),
            );
        }

        let digest = fingerprint_parts(&definition.parts);
        let request = CreateItemRequest {
            display_name: display_name.to_string(),
            description: read_platform_description(&bundle.model_folder_path),
            definition,
        };
        let published = ItemPublisher::new(self.api, ctx, ItemKind::SemanticModel)
            .create_or_update(&request)?;

        if ctx.options.refresh_after_publish {
            let refreshed = self.api.refresh_semantic_model(
                &ctx.token,
                &ctx.workspace_id,
                &published.remote_id,
            );
            if let Err(err) = refreshed {
                let warning = format!("refresh of model `{display_name}` failed: {err}");
                ctx.log.warn("model.refresh", &warning);
                warnings.push(warning);
            } else {
                ctx.log.info(
                    "model.refresh",
                    &format!("refresh requested for model `{display_name}`"),
                );
            }
        }

        Ok(PublishedModel {
            remote_id: published.remote_id,
            display_name: published.display_name,
            action: published.action,
            updated_connections,
            digest,
            warnings,
        })
    }
}

pub fn prepare_model_definition(
    ctx: &DeploymentContext,
    bundle: &ArtifactBundle,
) -> Result<(ItemDefinition, usize), DeploymentError> {
    let invalid = |reason: String| DeploymentError::InvalidBundle {
        base_name: bundle.base_name.clone(),
        reason,
    };
    bundle
        .ensure_valid()
        .map_err(|err| DeploymentError::invalid_bundle(&bundle.base_name, err))?;
    let primary = model_definition_file(&bundle.model_folder_path).ok_or_else(|| {
        invalid(format!(
            "no model definition in {}",
            bundle.model_folder_path.display()
        ))
    })?;

    let mut parts =
        read_parts(&bundle.model_folder_path).map_err(|err| invalid(err.to_string()))?;
    let rewriter = ConnectionRewriter::new(&ctx.options.connector_functions)
        .map_err(|err| invalid(err.to_string()))?;

    let mut updated_connections = 0;
    for part in parts
        .iter_mut()
        .filter(|part| is_connection_bearing(primary, &part.path))
    {
        let Some(original) = part.text() else {
            return Err(invalid(format!("{} is not valid utf-8", part.path)));
        };
        let rewrite = rewriter
            .rewrite_connections(original, DefinitionFormat::for_path(&part.path), &ctx.target)
            .map_err(|err| invalid(format!("{}: {err}", part.path)))?;
        updated_connections += rewrite.updated_count;
        if !rewrite.changed_from(original) {
            continue;
        }
        if ctx.options.write_back_definitions {
            write_back(bundle, part, rewrite.text.as_bytes())?;
        }
        part.payload = rewrite.text.into_bytes();
    }
    Ok((ItemDefinition::new(parts), updated_connections))
}

fn is_connection_bearing(primary: &str, part_path: &str) -> bool {
    part_path == primary || (primary.ends_with(".tmdl") && part_path.ends_with(".tmdl"))
}

fn write_back(
    bundle: &ArtifactBundle,
    part: &Part,
    content: &[u8],
) -> Result<(), DeploymentError> {
    let path = bundle.model_folder_path.join(&part.path);
    atomic_write_file(&path, content).map_err(|source| DeploymentError::Io {
        path: path.display().to_string(),
        source,
    })
}
