use std::fmt;

use thiserror::Error;

pub type WikiResult<T> = std::result::Result<T, WikiError>;

#[derive(Debug, Error)]
pub enum WikiError {
    /// Identifying parameters or credentials are missing; raised before any I/O.
    #[error("{0}")]
    NotConfigured(String),

    #[error("Page not found: {path}")]
    NotFound { path: String },

    #[error("Failed to {operation}: {message}")]
    TransportFailure { operation: String, message: String },

    #[error("Failed to {operation}: HTTP {status}{}", render_diagnostics(.diagnostics))]
    UpstreamStatus {
        operation: String,
        status: u16,
        diagnostics: Option<Box<WriteDiagnostics>>,
    },

    #[error("Failed to {operation}: {message}")]
    MalformedResponse { operation: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl WikiError {
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured(message.into())
    }

    pub fn transport(operation: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::TransportFailure {
            operation: operation.into(),
            message: error.to_string(),
        }
    }

    pub fn malformed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn upstream(operation: impl Into<String>, status: u16) -> Self {
        Self::UpstreamStatus {
            operation: operation.into(),
            status,
            diagnostics: None,
        }
    }
}

/// Everything a caller needs to tell a rejected create apart from a rejected update.
/// The service answers both on the same endpoint shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteDiagnostics {
    pub action: &'static str,
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub page_existed: bool,
    pub version: Option<String>,
}

fn render_diagnostics(diagnostics: &Option<Box<WriteDiagnostics>>) -> String {
    let Some(diagnostics) = diagnostics else {
        return String::new();
    };
    let headers = diagnostics
        .headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "\naction: {}\nurl: {}\nrequest_headers: {{{}}}\nrequest_body: {}\npage_existed: {}\nversion: {}",
        diagnostics.action,
        diagnostics.url,
        headers,
        diagnostics.body,
        diagnostics.page_existed,
        diagnostics.version.as_deref().unwrap_or("<none>")
    )
}
