use crate::app::command_support::{expect_args, load_config, map_config_err};
use crate::rewrite::{ConnectionRewriter, DefinitionFormat};
use crate::shared::DeployLog;
use std::fs;

pub fn cmd_rewrite(args: &[String]) -> Result<String, String> {
    let args = expect_args(
        args,
        3,
        "fabric-deploy rewrite <env> <config.yaml> <model-file>",
    )?;
    let config = load_config(&args[1])?;
    let (environment_name, environment) =
        config.environment(&args[0]).map_err(map_config_err)?;
    let path = &args[2];
    let definition =
        fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;

    let rewriter = ConnectionRewriter::new(&config.deployment.connector_functions)
        .map_err(|err| err.to_string())?;
    let rewrite = rewriter
        .rewrite_connections(
            &definition,
            DefinitionFormat::for_path(path),
            &environment.warehouse,
        )
        .map_err(|err| format!("{path}: {err}"))?;

    let log = DeployLog::new(&config.state_dir());
    let message = format!(
        "{path}: {} connection(s) retargeted to {} for `{environment_name}`",
        rewrite.updated_count,
        environment.warehouse.connection_path()
    );
    if rewrite.updated_count == 0 {
        log.warn("rewrite.preview", &message);
    } else {
        log.info("rewrite.preview", &message);
    }
    Ok(rewrite.text)
}
