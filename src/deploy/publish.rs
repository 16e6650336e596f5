use super::{DeploymentContext, DeploymentError};
use crate::fabric::{
    find_by_display_name, ApiError, CreateItemRequest, FabricApi, ItemDefinition, ItemKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedItem {
    pub remote_id: String,
    pub display_name: String,
    pub action: PublishAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishStrategy {
    UpdateExisting,
    Create,
    UpdateAfterConflict,
}

const PUBLISH_STRATEGIES: [PublishStrategy; 3] = [
    PublishStrategy::UpdateExisting,
    PublishStrategy::Create,
    PublishStrategy::UpdateAfterConflict,
];

enum StrategyOutcome {
    Published(PublishedItem),
    NotApplicable,
    Conflict(ApiError),
}

pub struct ItemPublisher<'a> {
    api: &'a dyn FabricApi,
    ctx: &'a DeploymentContext,
    kind: ItemKind,
}

impl<'a> ItemPublisher<'a> {
    pub fn new(api: &'a dyn FabricApi, ctx: &'a DeploymentContext, kind: ItemKind) -> Self {
        Self { api, ctx, kind }
    }

    pub fn find_existing_id(&self, display_name: &str) -> Result<Option<String>, ApiError> {
        let items = self
            .api
            .list_items(&self.ctx.token, &self.ctx.workspace_id, Some(self.kind))?;
        Ok(find_by_display_name(&items, display_name).map(|item| item.id.clone()))
    }

    pub fn create_or_update(
        &self,
        request: &CreateItemRequest,
    ) -> Result<PublishedItem, DeploymentError> {
        let mut conflict: Option<ApiError> = None;
        for strategy in PUBLISH_STRATEGIES {
            match self.attempt(strategy, request, conflict.as_ref())? {
                StrategyOutcome::Published(item) => return Ok(item),
                StrategyOutcome::NotApplicable => {}
                StrategyOutcome::Conflict(err) => {
                    self.ctx.log.warn(
                        "publish.conflict",
                        &format!(
                            "{} `{}` already exists; resolving it by name: {err}",
                            self.kind, request.display_name
                        ),
                    );
                    conflict = Some(err);
                }
            }
        }
        Err(DeploymentError::Publish {
            item: self.item_label(&request.display_name),
            body: conflict
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no publish strategy applied".to_string()),
        })
    }

    fn attempt(
        &self,
        strategy: PublishStrategy,
        request: &CreateItemRequest,
        conflict: Option<&ApiError>,
    ) -> Result<StrategyOutcome, DeploymentError> {
        let name = request.display_name.as_str();
        match strategy {
            PublishStrategy::UpdateExisting => match self.lookup(name)? {
                Some(id) => self.update(id, name, &request.definition),
                None => Ok(StrategyOutcome::NotApplicable),
            },
            PublishStrategy::Create => {
                match self.api.create_item(
                    &self.ctx.token,
                    &self.ctx.workspace_id,
                    self.kind,
                    request,
                ) {
                    Ok(created) => {
                        let remote_id = match created.id.filter(|id| !id.trim().is_empty()) {
                            Some(id) => id,
                            None => self.lookup(name)?.ok_or_else(|| DeploymentError::Publish {
                                item: self.item_label(name),
                                body: "create returned no id and the item is not listed yet"
                                    .to_string(),
                            })?,
                        };
                        self.ctx.log.info(
                            "publish.created",
                            &format!("{} `{name}` created as {remote_id}", self.kind),
                        );
                        Ok(StrategyOutcome::Published(PublishedItem {
                            remote_id,
                            display_name: name.to_string(),
                            action: PublishAction::Created,
                        }))
                    }
                    Err(err) if err.is_conflict() => Ok(StrategyOutcome::Conflict(err)),
                    Err(err) => Err(DeploymentError::publish(self.kind, name, &err)),
                }
            }
            PublishStrategy::UpdateAfterConflict => {
                let Some(conflict) = conflict else {
                    return Ok(StrategyOutcome::NotApplicable);
                };
                match self.lookup(name)? {
                    Some(id) => self.update(id, name, &request.definition),
                    None => Err(DeploymentError::publish(self.kind, name, conflict)),
                }
            }
        }
    }

    fn lookup(&self, display_name: &str) -> Result<Option<String>, DeploymentError> {
        self.find_existing_id(display_name)
            .map_err(|err| DeploymentError::publish(self.kind, display_name, &err))
    }

    fn update(
        &self,
        remote_id: String,
        display_name: &str,
        definition: &ItemDefinition,
    ) -> Result<StrategyOutcome, DeploymentError> {
        self.api
            .update_item_definition(
                &self.ctx.token,
                &self.ctx.workspace_id,
                self.kind,
                &remote_id,
                definition,
            )
            .map_err(|err| DeploymentError::publish(self.kind, display_name, &err))?;
        self.ctx.log.info(
            "publish.updated",
            &format!("{} `{display_name}` ({remote_id}) definition updated", self.kind),
        );
        Ok(StrategyOutcome::Published(PublishedItem {
            remote_id,
            display_name: display_name.to_string(),
            action: PublishAction::Updated,
        }))
    }

    fn item_label(&self, display_name: &str) -> String {
        format!("{} `{display_name}`", self.kind)
    }
}
