pub mod bundle;
pub mod locator;

pub use bundle::{
    model_definition_file, read_parts, read_platform_description, report_definition_file,
    ArtifactBundle, MODEL_DEFINITION_FILES, MODEL_MARKER_FILE, PLATFORM_FILE,
    REPORT_DEFINITION_FILES, REPORT_LINK_FILE,
};
pub use locator::{discover_bundles, validate_bundle};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact root {path} does not exist")]
    MissingRoot { path: String },
    #[error("folder {path} is not a `.SemanticModel` or `.Report` folder")]
    UnrecognizedFolder { path: String },
    #[error("bundle `{base_name}` is invalid: {reason}")]
    InvalidBundle { base_name: String, reason: String },
    #[error("failed to walk {path}: {reason}")]
    Walk { path: String, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
