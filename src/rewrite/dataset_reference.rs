use super::RewriteError;
use serde_json::{json, Map, Value};

pub const DATASET_REFERENCE_KEY: &str = "datasetReference";

pub fn semantic_model_connection_string(model_id: &str) -> String {
    format!("semanticmodelid={model_id}")
}

pub fn rewrite_dataset_reference(pbir: &str, model_id: &str) -> Result<String, RewriteError> {
    let model_id = model_id.trim();
    if model_id.is_empty() {
        return Err(RewriteError::MissingModelId);
    }
    let body = pbir.trim_start_matches('\u{feff}');
    let mut root: Map<String, Value> =
        serde_json::from_str(body).map_err(|err| RewriteError::InvalidJson(err.to_string()))?;
    root.insert(
        DATASET_REFERENCE_KEY.to_string(),
        json!({
            "byConnection": {
                "connectionString": semantic_model_connection_string(model_id)
            }
        }),
    );
    let mut rendered = serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|err| RewriteError::InvalidJson(err.to_string()))?;
    rendered.push('\n');
    Ok(rendered)
}

pub fn bound_model_id(pbir: &str) -> Option<String> {
    let root: Value = serde_json::from_str(pbir.trim_start_matches('\u{feff}')).ok()?;
    let connection = root
        .get(DATASET_REFERENCE_KEY)?
        .get("byConnection")?
        .get("connectionString")?
        .as_str()?;
    connection
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("semanticmodelid"))
        .map(|(_, value)| value.trim().to_string())
}
