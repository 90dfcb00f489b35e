//! The serve loop an engine process runs while the `--mcp` marker is set,
//! plus the thin lifecycle layer around it.
//!
//! Standard output belongs to the RPC stream. The subscriber installed here
//! writes to stderr; an engine that logs to stdout corrupts the protocol.

use crate::ToolSet;
use forge_common::{
    protocol::{
        error_code, method, CallToolParams, InitializeResult, ListToolsResult, Request, Response,
        PROTOCOL_VERSION, SERVE_FLAG,
    },
    transport::{FramedReader, FramedWriter},
};
use serde_json::{json, Value};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Serves the tool protocol on the process's standard streams until stdin
/// reaches EOF.
pub async fn serve_stdio(tools: &ToolSet) -> io::Result<()> {
    serve(tools, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serves the tool protocol over an arbitrary stream pair.
pub async fn serve<R, W>(tools: &ToolSet, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = FramedReader::new(reader);
    let mut writer = FramedWriter::new(writer);

    while let Some(raw) = reader.read::<Value>().await? {
        let request: Request = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(err) => {
                writer
                    .write(&Response::error(
                        Default::default(),
                        error_code::INVALID_REQUEST,
                        format!("malformed request: {err}"),
                    ))
                    .await?;
                continue;
            }
        };

        let is_notification = request.is_notification();
        let Some(response) = dispatch(tools, request).await else {
            debug_assert!(is_notification);
            continue;
        };
        writer.write(&response).await?;
    }
    trace!("stdin reached EOF, session over");
    Ok(())
}

/// Handles one request. `None` for notifications, which get no response.
async fn dispatch(tools: &ToolSet, request: Request) -> Option<Response> {
    let Request { method: rpc_method, params, id, .. } = request;
    let is_notification = matches!(id, forge_common::protocol::RequestId::Null);

    match rpc_method.as_str() {
        method::INITIALIZE => {
            let result = InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({ "tools": {} }),
                server_info: tools.server_info(),
            };
            Some(Response::success(id, serde_json::to_value(result).expect("result serializes")))
        }
        method::INITIALIZED => None,
        method::TOOLS_LIST => {
            let result = ListToolsResult { tools: tools.descriptors() };
            Some(Response::success(id, serde_json::to_value(result).expect("result serializes")))
        }
        method::TOOLS_CALL => {
            let params: CallToolParams = match serde_json::from_value(params.unwrap_or(Value::Null))
            {
                Ok(params) => params,
                Err(err) => {
                    return Some(Response::error(
                        id,
                        error_code::INVALID_PARAMS,
                        format!("malformed tools/call params: {err}"),
                    ));
                }
            };
            debug!(tool = %params.name, "dispatching tool call");
            match tools.call(&params.name, params.arguments).await {
                Some(result) => Some(Response::success(
                    id,
                    serde_json::to_value(result).expect("result serializes"),
                )),
                None => Some(Response::error(
                    id,
                    error_code::INVALID_PARAMS,
                    format!("unknown tool {:?}", params.name),
                )),
            }
        }
        other if is_notification => {
            trace!(method = other, "ignoring notification");
            None
        }
        other => Some(Response::error(
            id,
            error_code::METHOD_NOT_FOUND,
            format!("unknown method {other:?}"),
        )),
    }
}

/// Lifecycle entry point for an engine binary.
///
/// With [`SERVE_FLAG`] as the first argument the process serves the protocol
/// on its standard streams; `--version` prints the engine identity; anything
/// else prints usage.
pub async fn run(tools: ToolSet) -> eyre::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some(flag) if flag == SERVE_FLAG => {
            init_stderr_subscriber();
            serve_stdio(&tools).await?;
            Ok(())
        }
        Some("--version") | Some("-V") => {
            println!("{} {}", tools.name(), tools.version());
            Ok(())
        }
        _ => {
            print_usage(&tools);
            Ok(())
        }
    }
}

fn print_usage(tools: &ToolSet) {
    println!("{} {} (a Forge engine)", tools.name(), tools.version());
    println!();
    println!("Run with {SERVE_FLAG} to serve the tool protocol on stdio.");
    println!();
    println!("Tools:");
    for descriptor in tools.descriptors() {
        println!("  {:<12} {}", descriptor.name, descriptor.description);
    }
}

/// Installs a stderr-only subscriber, keeping stdout clean for the RPC
/// stream.
fn init_stderr_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
