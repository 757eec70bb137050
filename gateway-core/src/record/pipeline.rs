/// Three-stage error formatting: classify, log for operators, sanitize for
/// clients. Stages always run in that order.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{fields, ErrorRecord};
use crate::config::DeploymentMode;
use crate::error::GatewayError;
use crate::observability::{noop_logger, Logger};

pub const GRAPHQL_ERROR_CODE: &str = "GRAPHQL_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// A raw failure reported by the execution engine (syntax, validation,
/// argument errors) before it has been classified.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
    pub locations: Vec<Location>,
    pub path: Vec<Value>,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.locations.push(Location { line, column });
        self
    }

    pub fn with_path(mut self, path: Vec<Value>) -> Self {
        self.path = path;
        self
    }
}

/// Whatever was caught at the request boundary.
#[derive(Debug, Clone)]
pub enum OriginalError {
    Record(Box<ErrorRecord>),
    Query(QueryError),
}

impl From<ErrorRecord> for OriginalError {
    fn from(record: ErrorRecord) -> Self {
        OriginalError::Record(Box::new(record))
    }
}

impl From<QueryError> for OriginalError {
    fn from(error: QueryError) -> Self {
        OriginalError::Query(error)
    }
}

impl From<GatewayError> for OriginalError {
    fn from(error: GatewayError) -> Self {
        match error.as_record() {
            Some(record) => OriginalError::Record(Box::new(record.clone())),
            None => OriginalError::Query(QueryError::new(error.to_string())),
        }
    }
}

/// Stage 1. Records pass through untouched; anything else is wrapped and
/// keeps its locations and path.
pub fn handle_query_errors(error: OriginalError) -> ErrorRecord {
    match error {
        OriginalError::Record(record) => *record,
        OriginalError::Query(query) => {
            let mut builder = ErrorRecord::builder()
                .error_code(GRAPHQL_ERROR_CODE)
                .description(query.message.clone());
            if !query.locations.is_empty() || !query.path.is_empty() {
                builder = builder.data(json!({
                    "locations": query.locations,
                    "path": query.path,
                }));
            }
            builder.wrap(&query)
        }
    }
}

pub fn render_server_log(record: &ErrorRecord) -> String {
    let mut details = vec![format!("Error: {} ({})", record.summary(), record.guid)];
    details.extend(fields::detail_lines(record));

    if let Some(data) = &record.data {
        let rendered = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
        details.push(format!("Data: {}", rendered));
    }

    [details.join("\n"), record.trace.clone()].join("\n\n")
}

/// Stage 2.
pub fn print_detailed_server_log(logger: &dyn Logger, record: &ErrorRecord) {
    logger.error(&render_server_log(record));
}

/// Stage 3. Applying it twice in the same mode changes nothing further.
pub fn format_client_error_data(mut record: ErrorRecord, mode: DeploymentMode) -> ErrorRecord {
    if mode.is_production() {
        record.target_endpoint = None;
        record.docs_link = None;
    }

    if record.description.as_deref().map_or(true, str::is_empty) {
        record.description = record.message.take();
    }

    if let Some(description) = record.description.as_mut() {
        *description = description.replace('"', "'");
    }

    record
}

pub trait ErrorHooks: Send + Sync {
    fn on_original_error(&self, error: OriginalError) -> ErrorRecord;

    fn on_processed_error(&self, record: &ErrorRecord);

    fn on_final_error(&self, record: ErrorRecord) -> ErrorRecord;

    fn format(&self, error: OriginalError) -> ErrorRecord {
        let record = self.on_original_error(error);
        self.on_processed_error(&record);
        self.on_final_error(record)
    }
}

#[derive(Debug, Clone)]
pub struct ErrorFormatter {
    logger: Arc<dyn Logger>,
    mode: DeploymentMode,
}

impl ErrorFormatter {
    pub fn new(logger: Arc<dyn Logger>, mode: DeploymentMode) -> Self {
        Self { logger, mode }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Runs the pipeline and returns the client response body.
    pub fn format_to_value(&self, error: impl Into<OriginalError>) -> Value {
        let record = self.format(error.into());
        serde_json::to_value(&record).unwrap_or_else(|_| {
            json!({
                "statusCode": record.status_code,
                "description": record.description,
                "errorCode": record.error_code,
                "guid": record.guid,
            })
        })
    }
}

impl ErrorHooks for ErrorFormatter {
    fn on_original_error(&self, error: OriginalError) -> ErrorRecord {
        handle_query_errors(error)
    }

    fn on_processed_error(&self, record: &ErrorRecord) {
        print_detailed_server_log(self.logger.as_ref(), record);
    }

    fn on_final_error(&self, record: ErrorRecord) -> ErrorRecord {
        format_client_error_data(record, self.mode)
    }
}

/// Builds the hook bundle for an execution engine's error formatting slot.
pub fn format_error(logger: Option<Arc<dyn Logger>>, mode: DeploymentMode) -> ErrorFormatter {
    ErrorFormatter::new(logger.unwrap_or_else(noop_logger), mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{Level, RecordingLogger};

    fn mock_record() -> ErrorRecord {
        ErrorRecord {
            status_code: 401,
            error: "Unauthorized".to_string(),
            message: Some("error message".to_string()),
            description: Some("error description".to_string()),
            error_code: "TEST_ERROR_CODE".to_string(),
            graphql_model: Some("testGraphQLModel".to_string()),
            target_endpoint: Some("https://example.com/endpoint".to_string()),
            docs_link: Some("http://example.com/docs".to_string()),
            guid: "1234".to_string(),
            data: Some(json!({})),
            trace: "[stack trace goes here]".to_string(),
        }
    }

    #[test]
    fn test_query_errors_are_wrapped() {
        let error = QueryError::new("GraphQL syntax error").at(2, 3);
        let record = handle_query_errors(error.into());

        assert_eq!(record.description.as_deref(), Some("GraphQL syntax error"));
        assert_eq!(record.error_code, GRAPHQL_ERROR_CODE);
        assert_eq!(record.data.as_ref().unwrap()["locations"][0]["line"], 2);
        assert_eq!(record.data.as_ref().unwrap()["locations"][0]["column"], 3);
    }

    #[test]
    fn test_query_errors_without_positions_carry_no_data() {
        let record = handle_query_errors(QueryError::new("bad argument").into());
        assert!(record.data.is_none());
    }

    #[test]
    fn test_records_pass_through() {
        let original = mock_record();
        let record = handle_query_errors(original.clone().into());
        assert_eq!(record, original);
    }

    #[test]
    fn test_gateway_error_records_pass_through() {
        let original = mock_record();
        let error = GatewayError::from(original.clone());
        let record = handle_query_errors(error.into());
        assert_eq!(record.guid, "1234");
    }

    #[test]
    fn test_server_log_layout() {
        let log = render_server_log(&mock_record());
        let expected = [
            "Error: error description (1234)",
            "Description: error description",
            "Error Code: TEST_ERROR_CODE",
            "GraphQL Model: testGraphQLModel",
            "Target Endpoint: https://example.com/endpoint",
            "Documentation: http://example.com/docs",
            "Data: {}",
        ]
        .join("\n");
        assert_eq!(log, format!("{}\n\n[stack trace goes here]", expected));
        assert!(!log.contains("Error GUID"));
    }

    #[test]
    fn test_server_log_skips_missing_data() {
        let mut record = mock_record();
        record.data = None;
        assert!(!render_server_log(&record).contains("Data:"));
    }

    #[test]
    fn test_server_log_header_fallbacks() {
        let mut record = mock_record();
        record.description = None;
        assert!(render_server_log(&record).starts_with("Error: error message (1234)"));

        record.message = None;
        assert!(render_server_log(&record).starts_with("Error: something went wrong (1234)"));
    }

    #[test]
    fn test_processed_stage_logs_without_mutating() {
        let logger = Arc::new(RecordingLogger::new());
        let formatter = ErrorFormatter::new(logger.clone(), DeploymentMode::Development);
        let record = mock_record();

        formatter.on_processed_error(&record);

        assert_eq!(record, mock_record());
        let errors = logger.messages_at(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Error Code: TEST_ERROR_CODE"));
    }

    #[test]
    fn test_client_data_kept_outside_production() {
        let record = format_client_error_data(mock_record(), DeploymentMode::Development);
        assert_eq!(record, mock_record());
    }

    #[test]
    fn test_client_data_stripped_in_production() {
        let record = format_client_error_data(mock_record(), DeploymentMode::Production);
        assert_eq!(record.target_endpoint, None);
        assert_eq!(record.docs_link, None);
        assert_eq!(record.graphql_model.as_deref(), Some("testGraphQLModel"));
        assert_eq!(record.message.as_deref(), Some("error message"));
    }

    #[test]
    fn test_message_promoted_when_description_missing() {
        let mut record = mock_record();
        record.description = None;
        let record = format_client_error_data(record, DeploymentMode::Development);
        assert_eq!(record.description.as_deref(), Some("error message"));
        assert_eq!(record.message, None);
    }

    #[test]
    fn test_double_quotes_swapped() {
        let mut record = mock_record();
        record.description = Some("This has \"quotes\" in it.".to_string());
        let record = format_client_error_data(record, DeploymentMode::Development);
        assert_eq!(record.description.as_deref(), Some("This has 'quotes' in it."));
    }

    #[test]
    fn test_sanitization_is_idempotent() {
        for mode in [DeploymentMode::Production, DeploymentMode::Development] {
            let mut record = mock_record();
            record.description = None;
            let once = format_client_error_data(record, mode);
            let twice = format_client_error_data(once.clone(), mode);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_formatter_runs_all_stages() {
        let logger = Arc::new(RecordingLogger::new());
        let formatter = format_error(Some(logger.clone()), DeploymentMode::Production);

        let body = formatter.format_to_value(mock_record());

        assert_eq!(body["statusCode"], 401);
        assert_eq!(body["guid"], "1234");
        assert!(body.get("targetEndpoint").is_none());
        assert!(body.get("docsLink").is_none());
        assert_eq!(logger.messages_at(Level::Error).len(), 1);
    }

    #[test]
    fn test_formatter_defaults_to_silent_logger() {
        let formatter = format_error(None, DeploymentMode::Development);
        let record = formatter.format(QueryError::new("oops").into());
        assert_eq!(record.description.as_deref(), Some("oops"));
    }
}
