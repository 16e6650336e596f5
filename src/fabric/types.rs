use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    SemanticModel,
    Report,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SemanticModel => "SemanticModel",
            Self::Report => "Report",
        }
    }

    pub fn collection_path(self) -> &'static str {
        match self {
            Self::SemanticModel => "semanticModels",
            Self::Report => "reports",
        }
    }

    pub fn folder_suffix(self) -> &'static str {
        match self {
            Self::SemanticModel => ".SemanticModel",
            Self::Report => ".Report",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceItem {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl WorkspaceItem {
    pub fn is_kind(&self, kind: ItemKind) -> bool {
        self.item_type.eq_ignore_ascii_case(kind.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudConnection {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

// Single matching policy for every existing-vs-new lookup: surrounding whitespace is
// ignored, case is significant.
pub fn display_names_match(left: &str, right: &str) -> bool {
    left.trim() == right.trim()
}

pub fn find_by_display_name<'a>(
    items: &'a [WorkspaceItem],
    display_name: &str,
) -> Option<&'a WorkspaceItem> {
    items
        .iter()
        .find(|item| display_names_match(&item.display_name, display_name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadType {
    InlineBase64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub path: String,
    pub payload: Vec<u8>,
    pub payload_type: PayloadType,
}

impl Part {
    pub fn new(path: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            payload,
            payload_type: PayloadType::InlineBase64,
        }
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn to_wire(&self) -> Value {
        json!({
            "path": self.path,
            "payload": base64::engine::general_purpose::STANDARD.encode(&self.payload),
            "payloadType": self.payload_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemDefinition {
    pub parts: Vec<Part>,
}

impl ItemDefinition {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn part(&self, path: &str) -> Option<&Part> {
        self.parts.iter().find(|part| part.path == path)
    }

    pub fn part_mut(&mut self, path: &str) -> Option<&mut Part> {
        self.parts.iter_mut().find(|part| part.path == path)
    }

    pub fn to_wire(&self) -> Value {
        json!({
            "parts": self.parts.iter().map(Part::to_wire).collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateItemRequest {
    pub display_name: String,
    pub description: Option<String>,
    pub definition: ItemDefinition,
}

impl CreateItemRequest {
    pub fn to_wire(&self) -> Value {
        let mut body = json!({
            "displayName": self.display_name,
            "definition": self.definition.to_wire(),
        });
        if let Some(description) = self.description.as_deref().filter(|v| !v.is_empty()) {
            body["description"] = json!(description);
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreatedItem {
    pub id: Option<String>,
}
