//! Engine URI resolution.
//!
//! `go://<name>` is the sole supported scheme: the portion after the scheme
//! is a well-known short name, resolved to a run-from-source invocation of
//! the Go module ecosystem, pinned to a Forge release version. The scheme is
//! a resolvability hint: it dictates how the engine is spawned, nothing
//! else.

use crate::EngineCommand;

/// The sole supported engine URI scheme.
pub const ENGINE_SCHEME: &str = "go://";

/// Default module root that engine short names resolve under.
const DEFAULT_MODULE: &str = "github.com/forge-build/forge/cmd";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unsupported engine URI `{0}`: only the go:// scheme is resolvable")]
    UnsupportedScheme(String),
    #[error("engine URI `{0}` has an empty name")]
    EmptyName(String),
}

/// Resolves an engine URI to a spawnable command.
pub trait EngineResolver: Send + Sync {
    fn resolve(&self, uri: &str) -> Result<EngineCommand, ResolveError>;
}

/// Extracts the short name from an engine URI.
pub fn engine_name(uri: &str) -> Result<&str, ResolveError> {
    let name = uri
        .strip_prefix(ENGINE_SCHEME)
        .ok_or_else(|| ResolveError::UnsupportedScheme(uri.to_string()))?;
    if name.is_empty() {
        return Err(ResolveError::EmptyName(uri.to_string()));
    }
    Ok(name)
}

/// Resolves `go://<name>` to `go run <module>/<name>@<version>`.
#[derive(Clone, Debug)]
pub struct GoRunResolver {
    module: String,
    version: String,
}

impl GoRunResolver {
    /// A resolver pinned to `version`. Engines pass the version they captured
    /// at framework init; the orchestrator passes its own release version.
    pub fn new(version: impl Into<String>) -> Self {
        Self { module: DEFAULT_MODULE.to_string(), version: version.into() }
    }

    /// Overrides the module root the short names live under.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }
}

impl Default for GoRunResolver {
    fn default() -> Self {
        Self::new(crate::VERSION)
    }
}

impl EngineResolver for GoRunResolver {
    fn resolve(&self, uri: &str) -> Result<EngineCommand, ResolveError> {
        let name = engine_name(uri)?;
        let target = format!("{}/{}@v{}", self.module, name, self.version);
        Ok(EngineCommand::new("go", ["run".to_string(), target]))
    }
}
