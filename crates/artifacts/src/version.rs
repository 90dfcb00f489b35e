//! Source-commit identifier helper.

use std::{path::Path, process::Command};

/// Sentinel returned when the commit hash cannot be determined.
pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("failed to invoke git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git rev-parse failed: {0}")]
    Git(String),
}

/// Returns the HEAD commit hash of the source tree at `root`, or of the
/// current directory when `root` is `None`.
///
/// Two builds of the same tree produce the same identifier, which is what
/// lets a later run skip work whose inputs are unchanged.
pub fn commit_hash(root: Option<&Path>) -> Result<String, VersionError> {
    let mut cmd = Command::new("git");
    cmd.args(["rev-parse", "HEAD"]);
    if let Some(root) = root {
        cmd.current_dir(root);
    }
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(VersionError::Git(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Like [`commit_hash`] but degrades to [`UNKNOWN_VERSION`], logging the
/// failure.
pub fn commit_hash_or_unknown(root: Option<&Path>) -> String {
    match commit_hash(root) {
        Ok(hash) => hash,
        Err(err) => {
            warn!(%err, "could not resolve source commit, using sentinel version");
            UNKNOWN_VERSION.to_string()
        }
    }
}
