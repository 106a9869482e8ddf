//! Scripted in-memory transport for engine tests

use async_trait::async_trait;
use buildkick_client::{CiTransport, RestPaths};
use buildkick_utils::error::TransportError;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const SERVER: &str = "https://ci.test";

pub fn paths() -> RestPaths {
    RestPaths::new(SERVER)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub address: String,
    pub body: Option<String>,
}

type Reply = Result<String, u16>;

/// Replies are queued per method and address. The last queued reply repeats.
/// Unscripted GET and POST calls answer 404; unscripted PUT calls echo the body.
#[derive(Debug, Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<(&'static str, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server with the given configurations, steps as `(id, name, type, disabled)`.
    pub fn with_catalog(configs: &[(&str, &[(&str, &str, &str, bool)])]) -> Self {
        let paths = paths();
        let list: Vec<_> = configs
            .iter()
            .map(|(id, _)| serde_json::json!({ "id": id }))
            .collect();
        let mut fake = Self::new().reply(
            "GET",
            &paths.build_types(),
            &serde_json::json!({ "count": list.len(), "buildType": list }).to_string(),
        );
        for (id, steps) in configs {
            let steps: Vec<_> = steps
                .iter()
                .map(|(sid, name, kind, disabled)| {
                    serde_json::json!({ "id": sid, "name": name, "type": kind, "disabled": disabled })
                })
                .collect();
            fake = fake.reply(
                "GET",
                &paths.build_type(id),
                &serde_json::json!({ "id": id, "steps": { "count": steps.len(), "step": steps } })
                    .to_string(),
            );
        }
        fake
    }

    pub fn reply(self, method: &'static str, address: &str, body: &str) -> Self {
        self.push(method, address, Ok(body.to_string()))
    }

    pub fn fail(self, method: &'static str, address: &str, status: u16) -> Self {
        self.push(method, address, Err(status))
    }

    /// Answer the next queue request with `build_id`, confirmed on the first poll.
    pub fn queues(self, build_id: u64) -> Self {
        let paths = paths();
        self.reply(
            "POST",
            &paths.build_queue(),
            &format!(r#"{{"id":{build_id},"state":"queued","waitReason":"Build is waiting"}}"#),
        )
        .reply(
            "GET",
            &paths.build(&build_id.to_string()),
            &format!(r#"{{"id":{build_id},"state":"running"}}"#),
        )
    }

    fn push(self, method: &'static str, address: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry((method, address.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    /// `PUT` calls as `(address suffix after /buildTypes/, body)`.
    pub fn toggles(&self) -> Vec<(String, String)> {
        let prefix = format!("{}/buildTypes/", paths().root());
        self.calls()
            .into_iter()
            .filter(|c| c.method == "PUT")
            .map(|c| {
                (
                    c.address.trim_start_matches(&prefix).to_string(),
                    c.body.unwrap_or_default(),
                )
            })
            .collect()
    }

    fn respond(
        &self,
        method: &'static str,
        address: &str,
        body: Option<&str>,
    ) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(Call {
            method,
            address: address.to_string(),
            body: body.map(str::to_string),
        });

        let mut replies = self.replies.lock().unwrap();
        let reply = match replies.get_mut(&(method, address.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let reply = reply.unwrap_or_else(|| match (method, body) {
            ("PUT", Some(body)) => Ok(body.to_string()),
            _ => Err(404),
        });

        reply.map_err(|status| {
            let err = TransportError::status(method, address, status, "scripted failure");
            match body {
                Some(body) => err.with_payload(body),
                None => err,
            }
        })
    }
}

#[async_trait]
impl CiTransport for FakeTransport {
    async fn get_json(&self, address: &str) -> Result<String, TransportError> {
        self.respond("GET", address, None)
    }

    async fn post_xml(&self, address: &str, body: &str) -> Result<String, TransportError> {
        self.respond("POST", address, Some(body))
    }

    async fn put_text(&self, address: &str, body: &str) -> Result<String, TransportError> {
        self.respond("PUT", address, Some(body))
    }
}
