pub mod connection;
pub mod dataset_reference;

pub use connection::{
    quote_m_literal, ConnectionRewrite, ConnectionRewriter, DefinitionFormat,
};
pub use dataset_reference::{
    bound_model_id, rewrite_dataset_reference, semantic_model_connection_string,
    DATASET_REFERENCE_KEY,
};

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("no connector functions configured for connection rewriting")]
    NoConnectors,
    #[error("invalid connector pattern: {0}")]
    Pattern(String),
    #[error("definition is not valid json: {0}")]
    InvalidJson(String),
    #[error("cannot bind report without a semantic model id")]
    MissingModelId,
}
