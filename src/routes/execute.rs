//! Sandboxed script execution endpoint.
//!
//! DESIGN
//! ======
//! `POST /api/execute` writes the submitted code to a scratch file, runs the
//! matching interpreter under a wall-clock limit, and collapses every
//! outcome into plain text in the `output` field. There is no structured
//! error taxonomy here: compile errors, runtime errors and timeouts all come
//! back as whatever text best explains them, the way the editor panel
//! displays them.

use std::path::Path;
use std::process::Stdio;

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::info;

/// Wall-clock limit per execution. The process is killed at the deadline.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub output: String,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
enum ExecError {
    #[error("failed to start interpreter: {0}")]
    Spawn(std::io::Error),
    #[error("interpreter I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("execution timed out after {} seconds", EXEC_TIMEOUT.as_secs())]
    Timeout,
}

// =============================================================================
// HANDLER
// =============================================================================

pub async fn execute(Json(req): Json<ExecuteRequest>) -> (StatusCode, Json<ExecuteResponse>) {
    if req.code.is_empty() {
        return reply(StatusCode::BAD_REQUEST, "No code provided.");
    }

    let language = req.language.as_deref().unwrap_or("python");
    let result = match language {
        "python" => run_python(&req.code).await,
        "javascript" => run_script("node", &req.code, ".js").await,
        _ => return reply(StatusCode::BAD_REQUEST, "Unsupported language."),
    };

    match result {
        Ok(output) => {
            info!(language, bytes = output.len(), "execute: completed");
            reply(StatusCode::OK, &output)
        }
        Err(e) => reply(StatusCode::OK, &e.to_string()),
    }
}

fn reply(status: StatusCode, output: &str) -> (StatusCode, Json<ExecuteResponse>) {
    (status, Json(ExecuteResponse { output: output.to_string() }))
}

// =============================================================================
// EXECUTION
// =============================================================================

/// Try `python3` first, fall back to `python` where only the unversioned
/// binary exists.
async fn run_python(code: &str) -> Result<String, ExecError> {
    match run_script("python3", code, ".py").await {
        Err(ExecError::Spawn(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            run_script("python", code, ".py").await
        }
        other => other,
    }
}

async fn run_script(interpreter: &str, code: &str, suffix: &str) -> Result<String, ExecError> {
    let scratch = tempfile::Builder::new()
        .prefix("tutorboard_script_")
        .suffix(suffix)
        .tempfile()?;

    let mut file = tokio::fs::File::create(scratch.path()).await?;
    file.write_all(code.as_bytes()).await?;
    file.flush().await?;
    drop(file);

    let output = run_with_timeout(interpreter, scratch.path()).await?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if stderr.is_empty() {
            Ok(format!("Process exited with {}", output.status))
        } else {
            Ok(stderr)
        }
    }
}

async fn run_with_timeout(interpreter: &str, path: &Path) -> Result<std::process::Output, ExecError> {
    let child = Command::new(interpreter)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ExecError::Spawn)?;

    // Dropping the future at the deadline kills the child (kill_on_drop).
    match timeout(EXEC_TIMEOUT, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(ExecError::Timeout),
    }
}

#[cfg(test)]
#[path = "execute_test.rs"]
mod tests;
