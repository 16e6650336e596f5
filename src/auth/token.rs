#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(<{} chars>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token_value() {
        let token = AccessToken::new("eyJ0eXAiOiJKV1QiLCJhbGciOi");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("eyJ0"));
        assert_eq!(token.bearer_header(), "Bearer eyJ0eXAiOiJKV1QiLCJhbGciOi");
    }
}
