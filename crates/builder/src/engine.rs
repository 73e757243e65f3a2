//! Build-engine client
//!
//! Submits solve requests to the external build engine and consumes its
//! streamed status frames (newline-delimited JSON). Frames are forwarded in
//! arrival order; interpreting a terminal error frame is left to the caller
//! draining the channel.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use slipway_common::{Error, Result};

/// One solve invocation, as submitted to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    pub frontend: String,

    #[serde(rename = "frontendAttrs")]
    pub frontend_attrs: HashMap<String, String>,

    pub exporter: String,

    #[serde(rename = "exporterAttrs")]
    pub exporter_attrs: HashMap<String, String>,

    #[serde(rename = "localDirs")]
    pub local_dirs: HashMap<String, String>,

    pub session: Vec<String>,
}

impl SolveRequest {
    /// Solve pushing `image_ref` as an image, built from `context_dir` with
    /// the given frontend. Registry names are lowercased on export.
    pub fn new(
        image_ref: &str,
        frontend: &str,
        context_dir: &Path,
        insecure_registry: bool,
    ) -> Self {
        let context = context_dir.to_string_lossy().into_owned();

        let mut exporter_attrs = HashMap::new();
        exporter_attrs.insert("name".to_string(), image_ref.to_lowercase());
        exporter_attrs.insert("push".to_string(), "true".to_string());
        if insecure_registry {
            exporter_attrs.insert("registry.insecure".to_string(), "true".to_string());
        }

        let mut frontend_attrs = HashMap::new();
        frontend_attrs.insert("source".to_string(), frontend.to_string());

        let mut local_dirs = HashMap::new();
        local_dirs.insert("context".to_string(), context.clone());
        local_dirs.insert("dockerfile".to_string(), context);

        Self {
            frontend: "dockerfile.v0".to_string(),
            frontend_attrs,
            exporter: "image".to_string(),
            exporter_attrs,
            local_dirs,
            session: vec!["registry-auth".to_string()],
        }
    }
}

/// One status frame from the engine stream. A frame with `error` set is
/// terminal; its event lists still describe work done before the failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusFrame {
    #[serde(default)]
    pub vertexes: Vec<Vertex>,

    #[serde(default)]
    pub statuses: Vec<VertexStatus>,

    #[serde(default)]
    pub logs: Vec<VertexLog>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A build-graph step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
}

/// A progress counter for one vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexStatus {
    pub id: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub current: i64,
}

/// Captured build output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexLog {
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub data: String,
}

/// HTTP client for the build engine's `/solve` endpoint.
#[derive(Debug, Clone)]
pub struct EngineClient {
    client: reqwest::Client,
    base_url: String,
}

impl EngineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Submit a solve and forward every status frame into `frames` as it
    /// arrives. Returns when the engine closes the stream; transport
    /// failures and malformed frames abort with an error.
    pub async fn solve(
        &self,
        request: &SolveRequest,
        frames: mpsc::Sender<StatusFrame>,
    ) -> Result<()> {
        let url = format!("{}/solve", self.base_url);
        debug!("Submitting solve to {}", url);

        let mut response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Engine(format!("engine returned HTTP {status}")));
        }

        let mut buffer = FrameBuffer::default();
        while let Some(chunk) = response.chunk().await? {
            for frame in buffer.push(&chunk)? {
                if frames.send(frame).await.is_err() {
                    return Err(Error::Engine("status consumer dropped".into()));
                }
            }
        }
        if let Some(frame) = buffer.finish()? {
            if frames.send(frame).await.is_err() {
                return Err(Error::Engine("status consumer dropped".into()));
            }
        }

        Ok(())
    }
}

/// Reassembles newline-delimited JSON frames from arbitrarily split chunks.
#[derive(Debug, Default)]
struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    /// Append a chunk and parse every complete newline-terminated frame.
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<StatusFrame>> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if !line.iter().all(u8::is_ascii_whitespace) {
                frames.push(parse_frame(line)?);
            }
        }
        Ok(frames)
    }

    /// Parse a trailing frame that arrived without a final newline.
    fn finish(&mut self) -> Result<Option<StatusFrame>> {
        let pending = std::mem::take(&mut self.pending);
        if pending.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        parse_frame(&pending).map(Some)
    }
}

fn parse_frame(bytes: &[u8]) -> Result<StatusFrame> {
    serde_json::from_slice(bytes).map_err(|e| Error::Engine(format!("malformed status frame: {e}")))
}
