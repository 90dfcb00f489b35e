//! Shared Forge machinery: the tool-protocol codec, the engine client that
//! spawns engine subprocesses and exchanges framed JSON-RPC with them, and
//! URI resolution for engines and dependency detectors.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod protocol;
pub mod transport;

mod client;
pub use client::{EngineCommand, EngineInvoker, InvokeError, ProcessInvoker, ToolOutput};

mod resolver;
pub use resolver::{engine_name, EngineResolver, GoRunResolver, ResolveError, ENGINE_SCHEME};

mod detector;
pub use detector::call_detector;

pub mod retry;

/// The Forge release version, captured at build time.
///
/// Engines resolve detectors against the version they were built with; the
/// orchestrator resolves engines against its own.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
