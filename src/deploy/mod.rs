pub mod context;
pub mod error;
pub mod model_publisher;
pub mod orchestrator;
pub mod poller;
pub mod publish;
pub mod report_publisher;
pub mod result;
pub mod run_store;
pub mod workspace;

pub use context::DeploymentContext;
pub use error::DeploymentError;
pub use model_publisher::{prepare_model_definition, ModelPublisher, PublishedModel};
pub use orchestrator::{prepare_run, DeploymentOrchestrator, PreparedRun};
pub use poller::{poll_attempts, DeploymentPoller};
pub use publish::{ItemPublisher, PublishAction, PublishedItem};
pub use report_publisher::{prepare_report_definition, PublishedReport, ReportPublisher};
pub use result::{fingerprint_parts, DeploymentResult, DeploymentStep, FailureDetail, RunSummary};
pub use run_store::RunStore;
pub use workspace::WorkspaceResolver;
