use crate::config::Credentials;
use crate::shared::DeployLog;
use serde::Deserialize;
use std::time::Duration;

pub mod token;

pub use token::AccessToken;

pub const FABRIC_SCOPE: &str = "https://api.fabric.microsoft.com/.default";
pub const POWERBI_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";
pub const POWERBI_RESOURCE: &str = "https://analysis.windows.net/powerbi/api";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no token strategies configured")]
    NoStrategies,
    #[error("token exchange failed for every configured scope: {}", attempts.join("; "))]
    Exhausted { attempts: Vec<String> },
}

#[derive(Clone)]
pub struct TokenStrategy {
    pub label: String,
    pub endpoint: String,
    form: Vec<(String, String)>,
}

impl TokenStrategy {
    pub fn new(label: &str, endpoint: String, form: Vec<(String, String)>) -> Self {
        Self {
            label: label.to_string(),
            endpoint,
            form,
        }
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for TokenStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStrategy")
            .field("label", &self.label)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

pub fn default_token_strategies(authority: &str, credentials: &Credentials) -> Vec<TokenStrategy> {
    let authority = authority.trim_end_matches('/');
    let tenant = urlencoding::encode(&credentials.tenant_id);
    let v2_endpoint = format!("{authority}/{tenant}/oauth2/v2.0/token");
    let v1_endpoint = format!("{authority}/{tenant}/oauth2/token");

    let base_form = |extra: (&str, &str)| {
        vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), credentials.client_id.clone()),
            ("client_secret".to_string(), credentials.client_secret.clone()),
            (extra.0.to_string(), extra.1.to_string()),
        ]
    };

    vec![
        TokenStrategy::new(
            "fabric-scope-v2",
            v2_endpoint.clone(),
            base_form(("scope", FABRIC_SCOPE)),
        ),
        TokenStrategy::new(
            "powerbi-scope-v2",
            v2_endpoint,
            base_form(("scope", POWERBI_SCOPE)),
        ),
        TokenStrategy::new(
            "powerbi-resource-v1",
            v1_endpoint,
            base_form(("resource", POWERBI_RESOURCE)),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenProvider {
    agent: ureq::Agent,
    authority: String,
}

impl TokenProvider {
    pub fn new(authority: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            authority: authority.to_string(),
        }
    }

    pub fn acquire_token(
        &self,
        credentials: &Credentials,
        log: &DeployLog,
    ) -> Result<AccessToken, AuthError> {
        let strategies = default_token_strategies(&self.authority, credentials);
        self.acquire_with_strategies(&strategies, log)
    }

    pub fn acquire_with_strategies(
        &self,
        strategies: &[TokenStrategy],
        log: &DeployLog,
    ) -> Result<AccessToken, AuthError> {
        if strategies.is_empty() {
            return Err(AuthError::NoStrategies);
        }

        let mut attempts = Vec::new();
        for strategy in strategies {
            match self.exchange(strategy) {
                Ok(token) => {
                    log.info(
                        "auth.token_acquired",
                        &format!("acquired access token via {}", strategy.label),
                    );
                    return Ok(token);
                }
                Err(reason) => {
                    log.warn(
                        "auth.strategy_failed",
                        &format!("token exchange via {} failed: {reason}", strategy.label),
                    );
                    attempts.push(format!("{}: {reason}", strategy.label));
                }
            }
        }
        Err(AuthError::Exhausted { attempts })
    }

    fn exchange(&self, strategy: &TokenStrategy) -> Result<AccessToken, String> {
        let form: Vec<(&str, &str)> = strategy
            .form
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let response = match self.agent.post(&strategy.endpoint).send_form(&form) {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(format!("status {status}: {}", body.trim()));
            }
            Err(ureq::Error::Transport(transport)) => return Err(transport.to_string()),
        };

        let parsed: TokenResponse = response
            .into_json()
            .map_err(|e| format!("invalid token response: {e}"))?;
        match parsed.access_token {
            Some(token) if !token.trim().is_empty() => Ok(AccessToken::new(token)),
            _ => Err("token response did not contain an access_token".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            tenant_id: "contoso.onmicrosoft.com".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "s3cret".to_string(),
        }
    }

    #[test]
    fn default_strategies_try_fabric_then_powerbi_scopes() {
        let strategies = default_token_strategies("https://login.example.com/", &credentials());
        let labels: Vec<&str> = strategies.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["fabric-scope-v2", "powerbi-scope-v2", "powerbi-resource-v1"]
        );
        assert_eq!(
            strategies[0].endpoint,
            "https://login.example.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
        assert_eq!(strategies[0].form_value("scope"), Some(FABRIC_SCOPE));
        assert_eq!(strategies[1].form_value("scope"), Some(POWERBI_SCOPE));
        assert_eq!(
            strategies[2].endpoint,
            "https://login.example.com/contoso.onmicrosoft.com/oauth2/token"
        );
        assert_eq!(strategies[2].form_value("resource"), Some(POWERBI_RESOURCE));
        assert_eq!(
            strategies[2].form_value("grant_type"),
            Some("client_credentials")
        );
    }

    #[test]
    fn strategy_debug_hides_client_secret() {
        let strategies = default_token_strategies("https://login.example.com", &credentials());
        assert!(!format!("{:?}", strategies[0]).contains("s3cret"));
    }

    #[test]
    fn empty_strategy_list_is_rejected() {
        let provider = TokenProvider::new("https://login.example.com", Duration::from_secs(1));
        let err = provider
            .acquire_with_strategies(&[], &DeployLog::silent())
            .expect_err("no strategies");
        assert!(matches!(err, AuthError::NoStrategies));
    }
}
