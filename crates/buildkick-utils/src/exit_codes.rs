//! Exit code constants for the buildkick CLI
//!
//! The process exits 0 on success and 1 on every failure, including usage
//! errors. Named constants keep the call sites readable.

/// Type-safe process exit code.
///
/// # Example
///
/// ```rust
/// use buildkick_utils::error::{BuildKickError, ConfigError};
/// use buildkick_utils::exit_codes::ExitCode;
///
/// let err = BuildKickError::Config(ConfigError::MissingServer);
/// assert_eq!(err.to_exit_code(), ExitCode::FAILURE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - every build was triggered (or the dry run completed)
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Failure - configuration, transport, malformed response, timeout or restoration error
    pub const FAILURE: ExitCode = ExitCode(1);

    /// Usage - unrecognized command-line arguments
    pub const USAGE: ExitCode = ExitCode(1);

    /// Get the numeric exit code value.
    ///
    /// Use this with `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{
        BuildKickError, ConfigError, MalformedResponseError, TransportError, TransportErrorKind,
    };
    use std::time::Duration;

    #[test]
    fn test_numeric_values() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::FAILURE.as_i32(), 1);
        assert_eq!(ExitCode::USAGE.as_i32(), 1);
        assert!(ExitCode::SUCCESS.is_success());
        assert!(!ExitCode::FAILURE.is_success());
    }

    #[test]
    fn test_every_error_maps_to_failure() {
        let transport = TransportError::new(
            "GET",
            "https://ci/app/rest/buildTypes",
            TransportErrorKind::Connection("refused".into()),
        );
        let errors = vec![
            BuildKickError::Config(ConfigError::MissingServer),
            BuildKickError::Transport(transport.clone()),
            BuildKickError::MalformedResponse(MalformedResponseError::new(
                "https://ci/app/rest/buildTypes",
                "expected value at line 1 column 1",
            )),
            BuildKickError::ConfirmationTimeout {
                build_id: "42".into(),
                waited: Duration::from_secs(5),
            },
            BuildKickError::Cancelled {
                phase: "confirming build 42".into(),
            },
            BuildKickError::StepsLeftDisabled {
                config_id: "X".into(),
                step_ids: vec!["s1".into()],
                source: transport,
            },
        ];

        for err in errors {
            assert_eq!(err.to_exit_code(), ExitCode::FAILURE, "{err}");
        }
    }

    #[test]
    fn test_round_trip_i32() {
        let code: i32 = ExitCode::from(1).into();
        assert_eq!(code, 1);
    }
}
