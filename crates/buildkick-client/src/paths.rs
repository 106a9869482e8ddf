//! REST addresses under `{server}/app/rest`

/// Builds full request addresses for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestPaths {
    root: String,
}

impl RestPaths {
    /// `server` is the normalized base address without a trailing slash.
    #[must_use]
    pub fn new(server: &str) -> Self {
        Self {
            root: format!("{}/app/rest", server.trim_end_matches('/')),
        }
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn build_types(&self) -> String {
        format!("{}/buildTypes", self.root)
    }

    #[must_use]
    pub fn build_type(&self, config_id: &str) -> String {
        format!("{}/buildTypes/{config_id}", self.root)
    }

    #[must_use]
    pub fn step_disabled(&self, config_id: &str, step_id: &str) -> String {
        format!("{}/buildTypes/{config_id}/steps/{step_id}/disabled", self.root)
    }

    #[must_use]
    pub fn build_queue(&self) -> String {
        format!("{}/buildQueue", self.root)
    }

    #[must_use]
    pub fn build(&self, build_id: &str) -> String {
        format!("{}/builds/id:{build_id}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses() {
        let paths = RestPaths::new("https://ci.example.com/");
        assert_eq!(paths.build_types(), "https://ci.example.com/app/rest/buildTypes");
        assert_eq!(
            paths.build_type("Root_Build"),
            "https://ci.example.com/app/rest/buildTypes/Root_Build"
        );
        assert_eq!(
            paths.step_disabled("Root_Build", "RUNNER_3"),
            "https://ci.example.com/app/rest/buildTypes/Root_Build/steps/RUNNER_3/disabled"
        );
        assert_eq!(paths.build_queue(), "https://ci.example.com/app/rest/buildQueue");
        assert_eq!(paths.build("412"), "https://ci.example.com/app/rest/builds/id:412");
    }
}
