use super::{
    ApiError, CloudConnection, CreateItemRequest, CreatedItem, ItemDefinition, ItemKind,
    Workspace, WorkspaceItem,
};
use crate::auth::AccessToken;
use crate::config::{ApiEndpoints, ConnectionTarget};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const DEFAULT_RETRY_AFTER_SECONDS: u64 = 30;
const MAX_LIST_PAGES: usize = 500;

pub trait FabricApi {
    fn list_workspaces(&self, token: &AccessToken) -> Result<Vec<Workspace>, ApiError>;

    fn get_workspace(&self, token: &AccessToken, workspace_id: &str)
        -> Result<Workspace, ApiError>;

    fn list_items(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        kind: Option<ItemKind>,
    ) -> Result<Vec<WorkspaceItem>, ApiError>;

    fn create_item(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        kind: ItemKind,
        request: &CreateItemRequest,
    ) -> Result<CreatedItem, ApiError>;

    fn update_item_definition(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        kind: ItemKind,
        item_id: &str,
        definition: &ItemDefinition,
    ) -> Result<(), ApiError>;

    fn rebind_report(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        report_id: &str,
        model_id: &str,
    ) -> Result<(), ApiError>;

    fn refresh_semantic_model(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        model_id: &str,
    ) -> Result<(), ApiError>;

    fn list_connections(&self, token: &AccessToken) -> Result<Vec<CloudConnection>, ApiError>;

    fn bind_semantic_model_connection(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        model_id: &str,
        connection_id: &str,
        target: &ConnectionTarget,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationState {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct OperationResult {
    #[serde(default)]
    id: Option<String>,
}

struct Accepted {
    location: String,
    retry_after: Option<u64>,
    operation_id: Option<String>,
}

enum Sent {
    Done { url: String, body: String },
    Accepted(Accepted),
}

#[derive(Debug, Clone)]
pub struct HttpFabricClient {
    agent: ureq::Agent,
    fabric_base: String,
    powerbi_base: String,
    operation_max_wait: Duration,
}

impl HttpFabricClient {
    pub fn new(endpoints: &ApiEndpoints, operation_max_wait: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(endpoints.request_timeout_seconds))
                .build(),
            fabric_base: endpoints.fabric_base.trim_end_matches('/').to_string(),
            powerbi_base: endpoints.powerbi_base.trim_end_matches('/').to_string(),
            operation_max_wait,
        }
    }

    fn fabric_url(&self, path: &str) -> String {
        format!("{}/{}", self.fabric_base, path.trim_start_matches('/'))
    }

    fn powerbi_url(&self, path: &str) -> String {
        format!("{}/{}", self.powerbi_base, path.trim_start_matches('/'))
    }

    fn send(
        &self,
        method: &str,
        url: &str,
        token: &AccessToken,
        body: Option<&Value>,
    ) -> Result<Sent, ApiError> {
        let request = self
            .agent
            .request(method, url)
            .set("Authorization", &token.bearer_header())
            .set("Accept", "application/json");
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(ApiError::Status {
                    method: method.to_string(),
                    url: url.to_string(),
                    status,
                    body: response.into_string().unwrap_or_default(),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ApiError::Transport {
                    method: method.to_string(),
                    url: url.to_string(),
                    reason: transport.to_string(),
                });
            }
        };

        if let Some(location) = response
            .header("Location")
            .filter(|_| response.status() == 202)
            .map(str::to_string)
        {
            return Ok(Sent::Accepted(Accepted {
                location,
                retry_after: response
                    .header("Retry-After")
                    .and_then(|v| v.trim().parse::<u64>().ok()),
                operation_id: response.header("x-ms-operation-id").map(str::to_string),
            }));
        }

        let body = response.into_string().map_err(|e| ApiError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Sent::Done {
            url: url.to_string(),
            body,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, token: &AccessToken) -> Result<T, ApiError> {
        match self.send("GET", url, token, None)? {
            Sent::Done { url, body } => decode(&url, &body),
            Sent::Accepted(_) => Err(ApiError::Decode {
                url: url.to_string(),
                reason: "unexpected 202 Accepted on read".to_string(),
            }),
        }
    }

    fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &AccessToken,
    ) -> Result<Vec<T>, ApiError> {
        let mut all = Vec::new();
        let mut continuation: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let page_url = match continuation.as_deref() {
                Some(next) => {
                    let separator = if url.contains('?') { '&' } else { '?' };
                    format!(
                        "{url}{separator}continuationToken={}",
                        urlencoding::encode(next)
                    )
                }
                None => url.to_string(),
            };
            let page: ListPage<T> = self.get_json(&page_url, token)?;
            all.extend(page.value);
            continuation = page.continuation_token.filter(|v| !v.trim().is_empty());
            if continuation.is_none() {
                return Ok(all);
            }
        }
        Err(ApiError::Decode {
            url: url.to_string(),
            reason: format!("listing exceeded {MAX_LIST_PAGES} pages"),
        })
    }

    fn post_and_settle(
        &self,
        url: &str,
        token: &AccessToken,
        body: &Value,
    ) -> Result<Option<String>, ApiError> {
        match self.send("POST", url, token, Some(body))? {
            Sent::Done { body, .. } => Ok(Some(body)),
            Sent::Accepted(accepted) => {
                self.wait_for_operation(&accepted, token)?;
                match accepted.operation_id.as_deref() {
                    Some(operation_id) => {
                        let result_url =
                            self.fabric_url(&format!("operations/{operation_id}/result"));
                        match self.send("GET", &result_url, token, None) {
                            Ok(Sent::Done { body, .. }) => Ok(Some(body)),
                            Ok(Sent::Accepted(_)) => Ok(None),
                            // updateDefinition operations have no result payload
                            Err(err) if err.is_not_found() => Ok(None),
                            Err(err) => Err(err),
                        }
                    }
                    None => Ok(None),
                }
            }
        }
    }

    fn wait_for_operation(&self, accepted: &Accepted, token: &AccessToken) -> Result<(), ApiError> {
        let started = Instant::now();
        let mut delay = accepted.retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECONDS);
        let operation = accepted
            .operation_id
            .clone()
            .unwrap_or_else(|| accepted.location.clone());

        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.operation_max_wait {
                return Err(ApiError::OperationTimeout {
                    operation,
                    waited_seconds: elapsed.as_secs(),
                });
            }
            let remaining = self.operation_max_wait - elapsed;
            std::thread::sleep(Duration::from_secs(delay).min(remaining));

            let response = self
                .agent
                .get(&accepted.location)
                .set("Authorization", &token.bearer_header())
                .call();
            let response = match response {
                Ok(response) => response,
                Err(ureq::Error::Status(status, response)) => {
                    return Err(ApiError::Status {
                        method: "GET".to_string(),
                        url: accepted.location.clone(),
                        status,
                        body: response.into_string().unwrap_or_default(),
                    });
                }
                Err(ureq::Error::Transport(transport)) => {
                    return Err(ApiError::Transport {
                        method: "GET".to_string(),
                        url: accepted.location.clone(),
                        reason: transport.to_string(),
                    });
                }
            };
            if let Some(next) = response
                .header("Retry-After")
                .and_then(|v| v.trim().parse::<u64>().ok())
            {
                delay = next;
            }
            let body = response.into_string().map_err(|e| ApiError::Decode {
                url: accepted.location.clone(),
                reason: e.to_string(),
            })?;
            let state: OperationState = decode(&accepted.location, &body)?;
            match state.status.trim().to_ascii_lowercase().as_str() {
                "succeeded" => return Ok(()),
                "failed" | "cancelled" | "canceled" => {
                    return Err(ApiError::Operation {
                        operation,
                        status: state.status,
                        body,
                    });
                }
                _ => {}
            }
        }
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

impl FabricApi for HttpFabricClient {
    fn list_workspaces(&self, token: &AccessToken) -> Result<Vec<Workspace>, ApiError> {
        self.get_all_pages(&self.fabric_url("workspaces"), token)
    }

    fn get_workspace(
        &self,
        token: &AccessToken,
        workspace_id: &str,
    ) -> Result<Workspace, ApiError> {
        self.get_json(
            &self.fabric_url(&format!("workspaces/{}", urlencoding::encode(workspace_id))),
            token,
        )
    }

    fn list_items(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        kind: Option<ItemKind>,
    ) -> Result<Vec<WorkspaceItem>, ApiError> {
        let workspace = urlencoding::encode(workspace_id);
        let url = match kind {
            Some(kind) => self.fabric_url(&format!(
                "workspaces/{workspace}/{}",
                kind.collection_path()
            )),
            None => self.fabric_url(&format!("workspaces/{workspace}/items")),
        };
        let mut items: Vec<WorkspaceItem> = self.get_all_pages(&url, token)?;
        if let Some(kind) = kind {
            for item in &mut items {
                if item.item_type.is_empty() {
                    item.item_type = kind.as_str().to_string();
                }
            }
        }
        Ok(items)
    }

    fn create_item(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        kind: ItemKind,
        request: &CreateItemRequest,
    ) -> Result<CreatedItem, ApiError> {
        let url = self.fabric_url(&format!(
            "workspaces/{}/{}",
            urlencoding::encode(workspace_id),
            kind.collection_path()
        ));
        let body = self.post_and_settle(&url, token, &request.to_wire())?;
        let id = body
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| serde_json::from_str::<OperationResult>(&raw).ok())
            .and_then(|result| result.id)
            .filter(|id| !id.trim().is_empty());
        Ok(CreatedItem { id })
    }

    fn update_item_definition(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        kind: ItemKind,
        item_id: &str,
        definition: &ItemDefinition,
    ) -> Result<(), ApiError> {
        let url = self.fabric_url(&format!(
            "workspaces/{}/{}/{}/updateDefinition",
            urlencoding::encode(workspace_id),
            kind.collection_path(),
            urlencoding::encode(item_id)
        ));
        self.post_and_settle(&url, token, &json!({ "definition": definition.to_wire() }))?;
        Ok(())
    }

    fn rebind_report(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        report_id: &str,
        model_id: &str,
    ) -> Result<(), ApiError> {
        let url = self.powerbi_url(&format!(
            "groups/{}/reports/{}/Rebind",
            urlencoding::encode(workspace_id),
            urlencoding::encode(report_id)
        ));
        self.send("POST", &url, token, Some(&json!({ "datasetId": model_id })))?;
        Ok(())
    }

    fn refresh_semantic_model(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        model_id: &str,
    ) -> Result<(), ApiError> {
        let url = self.powerbi_url(&format!(
            "groups/{}/datasets/{}/refreshes",
            urlencoding::encode(workspace_id),
            urlencoding::encode(model_id)
        ));
        self.send(
            "POST",
            &url,
            token,
            Some(&json!({ "notifyOption": "NoNotification" })),
        )?;
        Ok(())
    }

    fn list_connections(&self, token: &AccessToken) -> Result<Vec<CloudConnection>, ApiError> {
        self.get_all_pages(&self.fabric_url("connections"), token)
    }

    fn bind_semantic_model_connection(
        &self,
        token: &AccessToken,
        workspace_id: &str,
        model_id: &str,
        connection_id: &str,
        target: &ConnectionTarget,
    ) -> Result<(), ApiError> {
        let url = self.fabric_url(&format!(
            "workspaces/{}/semanticModels/{}/bindConnection",
            urlencoding::encode(workspace_id),
            urlencoding::encode(model_id)
        ));
        let body = json!({
            "connectionBinding": {
                "id": connection_id,
                "connectivityType": "ShareableCloud",
                "connectionDetails": {
                    "type": "SQL",
                    "path": target.connection_path(),
                },
            },
        });
        self.post_and_settle(&url, token, &body)?;
        Ok(())
    }
}
