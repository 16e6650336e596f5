#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Deploy,
    Discover,
    Rewrite,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "deploy" => CliVerb::Deploy,
        "discover" => CliVerb::Discover,
        "rewrite" => CliVerb::Rewrite,
        "help" | "-h" | "--help" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Usage: fabric-deploy <command> [args]".to_string(),
        String::new(),
        "Commands:".to_string(),
        "  deploy <env> <config.yaml>             Publish every discovered bundle to <env>"
            .to_string(),
        "  discover <config.yaml>                 List discovered bundles and their validity"
            .to_string(),
        "  rewrite <env> <config.yaml> <file>     Print a model definition retargeted to <env>"
            .to_string(),
        "  help                                   Show this help".to_string(),
        String::new(),
        "Environment overrides: FABRIC_TENANT_ID, FABRIC_CLIENT_ID, FABRIC_CLIENT_SECRET"
            .to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse() {
        assert_eq!(parse_cli_verb("deploy"), CliVerb::Deploy);
        assert_eq!(parse_cli_verb("discover"), CliVerb::Discover);
        assert_eq!(parse_cli_verb("rewrite"), CliVerb::Rewrite);
        assert_eq!(parse_cli_verb("--help"), CliVerb::Help);
        assert_eq!(parse_cli_verb("publish"), CliVerb::Unknown);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for verb in ["deploy", "discover", "rewrite", "help"] {
            assert!(help.contains(&format!("  {verb}")), "missing {verb}");
        }
    }
}
