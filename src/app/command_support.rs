use crate::config::{load_deploy_config, ConfigError, DeployConfig};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn map_config_err(err: ConfigError) -> String {
    format!("pre-flight failed: {err}")
}

pub fn load_config(path: &str) -> Result<DeployConfig, String> {
    load_deploy_config(Path::new(path)).map_err(map_config_err)
}

pub fn expect_args<'a>(
    args: &'a [String],
    count: usize,
    usage: &str,
) -> Result<&'a [String], String> {
    if args.len() != count || args.iter().any(|arg| arg.trim().is_empty()) {
        return Err(format!("usage: {usage}"));
    }
    Ok(args)
}
