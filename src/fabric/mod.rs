pub mod client;
pub mod error;
pub mod types;

pub use client::{FabricApi, HttpFabricClient};
pub use error::ApiError;
pub use types::{
    display_names_match, find_by_display_name, CloudConnection, CreateItemRequest, CreatedItem,
    ItemDefinition, ItemKind, Part, PayloadType, Workspace, WorkspaceItem,
};
