/// Canonical structured errors and the pipeline that formats them.

pub mod fields;
pub mod pipeline;

pub use fields::{CustomField, FieldName, CUSTOM_FIELDS, GENERIC_ERROR_CODE};
pub use pipeline::{
    format_client_error_data, format_error, handle_query_errors, print_detailed_server_log,
    ErrorFormatter, ErrorHooks, OriginalError, QueryError,
};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::connector::TransportError;
use crate::error::ConnectorError;

pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred";
pub const FALLBACK_MESSAGE: &str = "something went wrong";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub status_code: u16,
    /// Reason phrase for `status_code`.
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub error_code: String,
    #[serde(default)]
    pub graphql_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_link: Option<String>,
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Operator-only failure trace. Never serialized.
    #[serde(skip)]
    pub trace: String,
}

impl ErrorRecord {
    pub fn builder() -> ErrorRecordBuilder {
        ErrorRecordBuilder::default()
    }

    pub fn field_value(&self, name: FieldName) -> Option<String> {
        match name {
            FieldName::Guid => Some(self.guid.clone()),
            FieldName::Description => self.description.clone(),
            FieldName::ErrorCode => Some(self.error_code.clone()),
            FieldName::GraphqlModel => self.graphql_model.clone(),
            FieldName::TargetEndpoint => self.target_endpoint.clone(),
            FieldName::DocsLink => self.docs_link.clone(),
        }
    }

    /// The most useful human-readable text this record carries.
    pub fn summary(&self) -> &str {
        self.description
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(FALLBACK_MESSAGE)
    }

}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.summary(), self.guid)
    }
}

impl std::error::Error for ErrorRecord {}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

/// Renders an error and its `source()` chain.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut lines = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("Caused by: {}", cause));
        source = cause.source();
    }
    lines.join("\n")
}

/// Status carried by a failure this crate knows how to read.
fn status_of(error: &(dyn std::error::Error + 'static)) -> Option<u16> {
    if let Some(record) = error.downcast_ref::<ErrorRecord>() {
        return Some(record.status_code);
    }
    if let Some(ConnectorError::Request(record)) = error.downcast_ref::<ConnectorError>() {
        return Some(record.status_code);
    }
    error.downcast_ref::<TransportError>().and_then(|err| err.status)
}

#[derive(Debug, Clone, Default)]
pub struct ErrorRecordBuilder {
    status_code: Option<u16>,
    message: Option<String>,
    description: Option<String>,
    error_code: Option<String>,
    graphql_model: Option<String>,
    target_endpoint: Option<String>,
    docs_link: Option<String>,
    data: Option<Value>,
}

impl ErrorRecordBuilder {
    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    pub fn graphql_model(mut self, graphql_model: impl Into<String>) -> Self {
        self.graphql_model = Some(graphql_model.into());
        self
    }

    pub fn target_endpoint(mut self, target_endpoint: impl Into<String>) -> Self {
        self.target_endpoint = Some(target_endpoint.into());
        self
    }

    pub fn docs_link(mut self, docs_link: impl Into<String>) -> Self {
        self.docs_link = Some(docs_link.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Builds a record from scratch.
    pub fn create(self) -> ErrorRecord {
        let status = self.resolved_status(None);
        let reason = reason_phrase(status);
        let message = self
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| reason.to_string());
        let trace = format!("{}: {}", reason, message);
        self.finish(status, message, trace)
    }

    /// Builds a record around a caught failure. The failure's message becomes
    /// the description unless one was supplied, and its status is used when
    /// none was.
    pub fn wrap(mut self, error: &(dyn std::error::Error + 'static)) -> ErrorRecord {
        let status = self.resolved_status(status_of(error));
        let base = error.to_string();
        let message = match self.message.take().filter(|m| !m.is_empty()) {
            Some(prefix) => format!("{}: {}", prefix, base),
            None => base.clone(),
        };
        if self.description.is_none() {
            self.description = Some(base);
        }
        let trace = error_chain(error);
        self.finish(status, message, trace)
    }

    fn resolved_status(&self, wrapped: Option<u16>) -> u16 {
        match self.status_code.or(wrapped) {
            Some(code) if (400..600).contains(&code) => code,
            _ => 500,
        }
    }

    fn finish(self, status: u16, message: String, trace: String) -> ErrorRecord {
        // 5xx messages are hidden from clients; the description carries detail.
        let client_message = if status >= 500 {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            message
        };

        ErrorRecord {
            status_code: status,
            error: reason_phrase(status).to_string(),
            message: Some(client_message),
            description: self.description,
            error_code: self
                .error_code
                .or_else(|| fields::default_for(FieldName::ErrorCode))
                .unwrap_or_else(|| GENERIC_ERROR_CODE.to_string()),
            graphql_model: self.graphql_model,
            target_endpoint: self.target_endpoint,
            docs_link: self.docs_link,
            guid: fields::default_for(FieldName::Guid).unwrap_or_default(),
            data: self.data,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("timeout")]
    struct Timeout;

    #[test]
    fn test_create_defaults() {
        let record = ErrorRecord::builder().create();
        assert_eq!(record.status_code, 500);
        assert_eq!(record.error, "Internal Server Error");
        assert_eq!(record.message.as_deref(), Some(INTERNAL_ERROR_MESSAGE));
        assert_eq!(record.description, None);
        assert_eq!(record.error_code, GENERIC_ERROR_CODE);
        assert_eq!(record.graphql_model, None);
        assert_eq!(record.target_endpoint, None);
        assert_eq!(record.docs_link, None);
        assert!(!record.guid.is_empty());
    }

    #[test]
    fn test_create_custom() {
        let record = ErrorRecord::builder()
            .status_code(418)
            .message("error message")
            .description("error description")
            .graphql_model("TestModel")
            .target_endpoint("https://example.org/test/endpoint")
            .docs_link("https://example.org/docs")
            .create();

        assert_eq!(record.status_code, 418);
        assert_eq!(record.message.as_deref(), Some("error message"));
        assert_eq!(record.description.as_deref(), Some("error description"));
        assert_eq!(record.graphql_model.as_deref(), Some("TestModel"));
        assert_eq!(
            record.target_endpoint.as_deref(),
            Some("https://example.org/test/endpoint")
        );
        assert_eq!(record.docs_link.as_deref(), Some("https://example.org/docs"));
    }

    #[test]
    fn test_wrap_plain_failure() {
        let record = ErrorRecord::builder().wrap(&Timeout);
        assert_eq!(record.status_code, 500);
        assert!(record.description.as_deref().unwrap().contains("timeout"));
        assert!(uuid::Uuid::parse_str(&record.guid).is_ok());
        assert_eq!(record.trace, "timeout");
    }

    #[test]
    fn test_wrap_generates_fresh_guid() {
        let first = ErrorRecord::builder().wrap(&Timeout);
        let second = ErrorRecord::builder().wrap(&Timeout);
        assert_ne!(first.guid, second.guid);
    }

    #[test]
    fn test_wrap_client_error_keeps_message() {
        let record = ErrorRecord::builder()
            .status_code(404)
            .message("lookup failed")
            .wrap(&Timeout);
        assert_eq!(record.error, "Not Found");
        assert_eq!(record.message.as_deref(), Some("lookup failed: timeout"));
    }

    #[test]
    fn test_wrap_uses_status_of_wrapped_failure() {
        let not_found = ErrorRecord::builder().status_code(404).create();
        assert_eq!(ErrorRecord::builder().wrap(&not_found).status_code, 404);

        let boxed = ConnectorError::from(not_found.clone());
        assert_eq!(ErrorRecord::builder().wrap(&boxed).status_code, 404);

        let transport = TransportError {
            message: "gone".to_string(),
            status: Some(410),
        };
        let record = ErrorRecord::builder().wrap(&transport);
        assert_eq!(record.status_code, 410);
        assert_eq!(record.error, "Gone");

        let explicit = ErrorRecord::builder().status_code(502).wrap(&not_found);
        assert_eq!(explicit.status_code, 502);
    }

    #[test]
    fn test_invalid_status_falls_back_to_500() {
        let record = ErrorRecord::builder().status_code(200).create();
        assert_eq!(record.status_code, 500);
    }

    #[test]
    fn test_serialization_skips_trace() {
        let record = ErrorRecord::builder()
            .description("boom")
            .data(json!({ "id": 1 }))
            .create();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["statusCode"], 500);
        assert_eq!(value["description"], "boom");
        assert_eq!(value["data"]["id"], 1);
        assert!(value.get("trace").is_none());
        assert!(value.get("targetEndpoint").is_none());
    }
}
