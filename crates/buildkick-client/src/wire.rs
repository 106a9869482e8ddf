//! JSON payloads returned by the CI server
//!
//! Every collection and optional attribute defaults when absent. Required
//! identifiers are not optional: a payload without them fails to decode.

use buildkick_utils::error::MalformedResponseError;
use buildkick_utils::types::BuildStep;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `GET /buildTypes`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildTypeList {
    #[serde(rename = "buildType", default)]
    pub build_types: Vec<BuildTypeRef>,
}

impl BuildTypeList {
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.build_types.iter().map(|b| b.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildTypeRef {
    pub id: String,
}

/// `GET /buildTypes/{id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildTypeDetail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub steps: Option<StepList>,
}

impl BuildTypeDetail {
    /// Steps in server order; a missing `steps` object means none.
    #[must_use]
    pub fn into_steps(self) -> Vec<BuildStep> {
        self.steps
            .map(|list| list.steps.into_iter().map(StepWire::into_step).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StepList {
    #[serde(rename = "step", default)]
    pub steps: Vec<StepWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StepWire {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub disabled: Option<bool>,
}

impl StepWire {
    #[must_use]
    pub fn into_step(self) -> BuildStep {
        BuildStep::new(
            self.id,
            self.name,
            self.step_type,
            self.disabled.unwrap_or(false),
        )
    }
}

/// Build ids arrive as JSON numbers; some proxies turn them into strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BuildId {
    Number(u64),
    Text(String),
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildId::Number(n) => write!(f, "{n}"),
            BuildId::Text(s) => f.write_str(s),
        }
    }
}

/// `POST /buildQueue` and `GET /builds/id:{id}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    pub id: BuildId,
    #[serde(default)]
    pub state: Option<String>,
    /// Present while the build is still waiting in the queue
    #[serde(default)]
    pub wait_reason: Option<String>,
}

/// Decode a response body, naming the address on failure.
///
/// # Errors
///
/// Returns `MalformedResponseError` when the body is not valid JSON of the
/// expected shape.
pub fn decode<T: DeserializeOwned>(address: &str, body: &str) -> Result<T, MalformedResponseError> {
    serde_json::from_str(body).map_err(|e| MalformedResponseError::new(address, e.to_string()))
}
