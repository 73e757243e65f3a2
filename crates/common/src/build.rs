use serde::{Deserialize, Serialize};

/// Status string carried by a successful build.
pub const SUCCESS: &str = "success";

/// Outcome of a single build request, returned to callers as JSON.
///
/// The body is emitted with this exact shape on both the success and the
/// failure path so downstream services can always parse the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    /// Ordered log lines collected while the build ran.
    #[serde(rename = "log")]
    pub log: Vec<String>,

    /// Fully-qualified image reference the build targeted. Empty when the
    /// build failed before a target was read from its config.
    #[serde(rename = "imageName")]
    pub image_name: String,

    /// "success", or a message describing why the build failed.
    #[serde(rename = "status")]
    pub status: String,
}

impl BuildResult {
    pub fn success(image_name: impl Into<String>, log: Vec<String>) -> Self {
        Self {
            log,
            image_name: image_name.into(),
            status: SUCCESS.to_string(),
        }
    }

    pub fn failure(
        image_name: impl Into<String>,
        status: impl Into<String>,
        log: Vec<String>,
    ) -> Self {
        Self {
            log,
            image_name: image_name.into(),
            status: status.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SUCCESS
    }
}
