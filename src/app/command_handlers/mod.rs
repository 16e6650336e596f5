use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod deploy;
pub mod discover;
pub mod rewrite;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Deploy => deploy::cmd_deploy(&args[1..]),
        CliVerb::Discover => discover::cmd_discover(&args[1..]),
        CliVerb::Rewrite => rewrite::cmd_rewrite(&args[1..]),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`\n\n{}", args[0], help_text())),
    }
}
