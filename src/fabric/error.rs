const CONFLICT_ERROR_CODES: [&str; 2] =
    ["ItemDisplayNameAlreadyInUse", "ItemDisplayNameNotAvailableYet"];

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request {method} {url} failed: {reason}")]
    Transport {
        method: String,
        url: String,
        reason: String,
    },
    #[error("{method} {url} returned status {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("long-running operation `{operation}` ended with status `{status}`: {body}")]
    Operation {
        operation: String,
        status: String,
        body: String,
    },
    #[error("long-running operation `{operation}` did not finish within {waited_seconds}s")]
    OperationTimeout {
        operation: String,
        waited_seconds: u64,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } | Self::Operation { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Status { status: 409, .. } => true,
            Self::Status { body, .. } | Self::Operation { body, .. } => CONFLICT_ERROR_CODES
                .iter()
                .any(|code| body.contains(code)),
            _ => false,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, body: &str) -> ApiError {
        ApiError::Status {
            method: "POST".to_string(),
            url: "https://api.example.com/v1/workspaces/ws/reports".to_string(),
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn conflict_is_detected_by_status_or_error_code() {
        assert!(status(409, "").is_conflict());
        assert!(status(
            400,
            r#"{"errorCode":"ItemDisplayNameAlreadyInUse","message":"in use"}"#
        )
        .is_conflict());
        assert!(!status(400, r#"{"errorCode":"InvalidDefinition"}"#).is_conflict());
        assert!(!ApiError::Decode {
            url: "u".to_string(),
            reason: "r".to_string()
        }
        .is_conflict());
    }

    #[test]
    fn auth_and_not_found_classification() {
        assert!(status(401, "").is_auth_failure());
        assert!(status(403, "").is_auth_failure());
        assert!(!status(404, "").is_auth_failure());
        assert!(status(404, "").is_not_found());
        assert_eq!(status(500, "boom").body(), Some("boom"));
    }
}
