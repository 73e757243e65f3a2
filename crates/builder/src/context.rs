//! Build-context handling
//!
//! Unpacks an uploaded archive into a request-scoped working directory and
//! reads the build configuration from the `config` file at its root.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tempfile::TempDir;

use slipway_common::{Error, Result};

/// Frontend used when the build config does not name one.
pub const DEFAULT_FRONTEND: &str = "tonistiigi/dockerfile:v0";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Contents of the `config` file shipped at the archive root.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    #[serde(rename = "Ref", default)]
    pub image_ref: String,

    #[serde(rename = "Frontend", default)]
    pub frontend: String,
}

/// An unpacked build context. The working directory is removed on drop.
#[derive(Debug)]
pub struct BuildContext {
    workdir: TempDir,
    pub image_ref: String,
    pub frontend: String,
}

impl BuildContext {
    /// Unpack `payload` (tar, or gzip-compressed tar) and read its config.
    pub fn prepare(payload: &[u8], preserve_ownership: bool) -> Result<Self> {
        let workdir = tempfile::Builder::new().prefix("buildctx").tempdir()?;
        unpack_archive(payload, workdir.path(), preserve_ownership)?;

        let raw = fs::read(workdir.path().join("config"))?;
        let config: BuildConfig = serde_json::from_slice(&raw)?;

        if config.image_ref.is_empty() {
            return Err(Error::Validation("no target reference to push".into()));
        }

        let frontend = if config.frontend.is_empty() {
            DEFAULT_FRONTEND.to_string()
        } else {
            config.frontend
        };

        Ok(Self {
            workdir,
            image_ref: config.image_ref,
            frontend,
        })
    }

    /// Directory holding the buildable source tree.
    pub fn context_dir(&self) -> PathBuf {
        self.workdir.path().join("context")
    }
}

fn unpack_archive(payload: &[u8], dest: &Path, preserve_ownership: bool) -> Result<()> {
    if payload.starts_with(&GZIP_MAGIC) {
        unpack_tar(flate2::read::GzDecoder::new(payload), dest, preserve_ownership)
    } else {
        unpack_tar(payload, dest, preserve_ownership)
    }
}

fn unpack_tar<R: Read>(reader: R, dest: &Path, preserve_ownership: bool) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_ownerships(preserve_ownership);
    archive.unpack(dest)?;
    Ok(())
}
