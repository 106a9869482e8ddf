use buildkick_redaction::CredentialRedactor;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of response-body characters kept in a transport error.
const MAX_BODY_CHARS: usize = 512;

/// Library-level error type for a trigger run.
///
/// Every variant is fatal for the run and maps to exit code 1. Unmatched
/// exclusion names are not errors; they are logged as warnings by the policy
/// engine instead.
///
/// | Variant | Raised when |
/// |---------|-------------|
/// | `Config` | server or credentials missing, invalid setting (before any network call) |
/// | `Transport` | connection failure or non-success HTTP status |
/// | `MalformedResponse` | response body does not decode into the expected shape |
/// | `ConfirmationTimeout` | a queued build kept its wait reason past the maximum wait |
/// | `Cancelled` | the operator interrupted the run |
/// | `StepsLeftDisabled` | temporarily disabled steps could not be re-enabled |
/// | `Artifact` | a debug artifact could not be written |
///
/// Library code returns `BuildKickError` and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum BuildKickError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] MalformedResponseError),

    #[error("Build {build_id} was not confirmed within {waited:?}")]
    ConfirmationTimeout { build_id: String, waited: Duration },

    #[error("Run cancelled while {phase}")]
    Cancelled { phase: String },

    #[error("Steps left disabled in {config_id}: {}", step_ids.join(", "))]
    StepsLeftDisabled {
        config_id: String,
        step_ids: Vec<String>,
        #[source]
        source: TransportError,
    },

    #[error("Failed to write debug artifact {path}: {reason}")]
    Artifact { path: String, reason: String },
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Protocol,
    Timeout,
    Cancellation,
    Restoration,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Transport => write!(f, "Transport"),
            Self::Protocol => write!(f, "Protocol"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Cancellation => write!(f, "Cancellation"),
            Self::Restoration => write!(f, "Restoration"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No server specified")]
    MissingServer,

    #[error("No username specified")]
    MissingUsername,

    #[error("No password specified")]
    MissingPassword,

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read properties file {path}: {reason}")]
    PropertiesFile { path: String, reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::MissingServer => "No CI server address could be resolved".to_string(),
            Self::MissingUsername => "No CI username could be resolved".to_string(),
            Self::MissingPassword => "No CI password could be resolved".to_string(),
            Self::InvalidValue { key, value } => {
                format!("Setting '{key}' has invalid value: '{value}'")
            }
            Self::PropertiesFile { path, reason } => {
                format!("Properties file '{path}' could not be read: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::MissingServer | Self::MissingUsername | Self::MissingPassword => Some(
                "Settings are resolved from environment variables first, then from the CI build \
                 and configuration properties files."
                    .to_string(),
            ),
            Self::InvalidValue { .. } => None,
            Self::PropertiesFile { .. } => Some(
                "The build properties file is located through TEAMCITY_BUILD_PROPERTIES_FILE."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingServer => vec![
                "Set BuildServer to the CI server address".to_string(),
                "Or run inside a CI agent that provides teamcity.serverUrl".to_string(),
            ],
            Self::MissingUsername => vec![
                "Set BuildUsername".to_string(),
                "Or run inside a CI agent that provides teamcity.auth.userId".to_string(),
            ],
            Self::MissingPassword => vec![
                "Set BuildPassword".to_string(),
                "Or run inside a CI agent that provides teamcity.auth.password".to_string(),
            ],
            Self::InvalidValue { key, .. } => vec![format!("Check the value of {key}")],
            Self::PropertiesFile { .. } => vec![
                "Check that the properties file exists and is readable".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// What went wrong on the wire
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,
}

/// A request that did not produce a success response.
///
/// Carries the failing address and, for mutating calls, the payload that was
/// sent so the operator can replay it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{method} {address} failed: {kind}")]
pub struct TransportError {
    pub method: String,
    pub address: String,
    pub payload: Option<String>,
    pub kind: TransportErrorKind,
}

impl TransportError {
    #[must_use]
    pub fn new(method: impl Into<String>, address: impl Into<String>, kind: TransportErrorKind) -> Self {
        Self {
            method: method.into(),
            address: address.into(),
            payload: None,
            kind,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Build a status error, truncating long response bodies.
    #[must_use]
    pub fn status(
        method: impl Into<String>,
        address: impl Into<String>,
        status: u16,
        body: &str,
    ) -> Self {
        let body = if body.chars().count() > MAX_BODY_CHARS {
            let truncated: String = body.chars().take(MAX_BODY_CHARS).collect();
            format!("{truncated}...")
        } else {
            body.to_string()
        };
        Self::new(method, address, TransportErrorKind::Status { status, body })
    }
}

/// A response that could not be decoded into the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected response from {address}: {reason}")]
pub struct MalformedResponseError {
    pub address: String,
    pub reason: String,
}

impl MalformedResponseError {
    #[must_use]
    pub fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

impl UserFriendlyError for BuildKickError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Transport(err) => format!("Request to the CI server failed: {err}"),
            Self::MalformedResponse(err) => {
                format!("The CI server returned an unexpected response: {err}")
            }
            Self::ConfirmationTimeout { build_id, waited } => format!(
                "Build {build_id} was still waiting in the queue after {}s",
                waited.as_secs()
            ),
            Self::Cancelled { phase } => format!("Run cancelled while {phase}"),
            Self::StepsLeftDisabled {
                config_id,
                step_ids,
                ..
            } => format!(
                "Steps {} of build config '{config_id}' could not be re-enabled",
                step_ids.join(", ")
            ),
            Self::Artifact { path, reason } => {
                format!("Debug artifact '{path}' could not be written: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Transport(err) => err
                .payload
                .as_ref()
                .map(|payload| format!("Payload: '{payload}'")),
            Self::StepsLeftDisabled { source, .. } => Some(format!("Last failure: {source}")),
            Self::MalformedResponse(_)
            | Self::ConfirmationTimeout { .. }
            | Self::Cancelled { .. }
            | Self::Artifact { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Transport(_) => vec![
                "Check that the server address is reachable".to_string(),
                "Check that the credentials have permission to edit and run builds".to_string(),
            ],
            Self::MalformedResponse(_) => vec![
                "Run with BuildDebug=true to capture the raw responses".to_string(),
            ],
            Self::ConfirmationTimeout { .. } => vec![
                "Check the build queue and agent availability on the server".to_string(),
                "Raise BuildConfirmTimeoutSeconds or unset it to wait indefinitely".to_string(),
            ],
            Self::Cancelled { .. } => Vec::new(),
            Self::StepsLeftDisabled { .. } => vec![
                "Re-enable the listed steps manually on the CI server".to_string(),
            ],
            Self::Artifact { .. } => {
                vec!["Check that BuildDebugDir points to a writable directory".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::MalformedResponse(_) => ErrorCategory::Protocol,
            Self::ConfirmationTimeout { .. } => ErrorCategory::Timeout,
            Self::Cancelled { .. } => ErrorCategory::Cancellation,
            Self::StepsLeftDisabled { .. } => ErrorCategory::Restoration,
            Self::Artifact { .. } => ErrorCategory::FileSystem,
        }
    }
}

impl BuildKickError {
    /// Get a user-friendly error message with context and suggestions.
    ///
    /// Only the shape-based redaction patterns are applied; prefer
    /// [`display_for_user_with_redactor`](Self::display_for_user_with_redactor)
    /// once the run's credentials are known.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        self.display_for_user_with_redactor(&CredentialRedactor::new())
    }

    /// Get a user-friendly error message, applying a caller-provided redactor
    /// as a final safety net.
    #[must_use]
    pub fn display_for_user_with_redactor(&self, redactor: &CredentialRedactor) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        redactor.redact(&output)
    }

    /// Map this error to the CLI exit code. Every run failure exits 1.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        crate::exit_codes::ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display_includes_address() {
        let err = TransportError::status("POST", "https://ci/app/rest/buildQueue", 403, "Forbidden")
            .with_payload("<build><buildType id='A'/></build>");
        let text = err.to_string();
        assert!(text.contains("POST https://ci/app/rest/buildQueue"));
        assert!(text.contains("403"));
        assert_eq!(
            err.payload.as_deref(),
            Some("<build><buildType id='A'/></build>")
        );
    }

    #[test]
    fn test_status_body_is_truncated() {
        let body = "x".repeat(2000);
        let err = TransportError::status("GET", "https://ci", 500, &body);
        match err.kind {
            TransportErrorKind::Status { body, .. } => {
                assert!(body.len() < 600);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_display_for_user_redacts_credentials() {
        let err = BuildKickError::Transport(TransportError::new(
            "GET",
            "https://bot:pw1234@ci/app/rest/buildTypes",
            TransportErrorKind::Connection("refused".into()),
        ));
        let redactor = CredentialRedactor::new().with_secret("pw1234");
        let shown = err.display_for_user_with_redactor(&redactor);
        assert!(!shown.contains("pw1234"));
        assert!(shown.contains("Suggestions:"));
    }

    #[test]
    fn test_display_for_user_shows_payload_context() {
        let err = BuildKickError::Transport(
            TransportError::status("PUT", "https://ci/x", 500, "boom").with_payload("true"),
        );
        assert!(err.display_for_user().contains("Payload: 'true'"));
    }

    #[test]
    fn test_steps_left_disabled_lists_steps() {
        let err = BuildKickError::StepsLeftDisabled {
            config_id: "App_Build".into(),
            step_ids: vec!["RUNNER_1".into(), "RUNNER_2".into()],
            source: TransportError::new("PUT", "https://ci", TransportErrorKind::Timeout),
        };
        assert_eq!(
            err.to_string(),
            "Steps left disabled in App_Build: RUNNER_1, RUNNER_2"
        );
        assert_eq!(err.category(), ErrorCategory::Restoration);
    }

    #[test]
    fn test_config_error_suggestions() {
        let err = BuildKickError::Config(ConfigError::MissingServer);
        let shown = err.display_for_user();
        assert!(shown.contains("BuildServer"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
