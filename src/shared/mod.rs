pub mod fs_atomic;
pub mod ids;
pub mod logging;

pub use fs_atomic::atomic_write_file;
pub use ids::generate_run_id;
pub use logging::{deploy_log_path, DeployLog, LogLevel};
