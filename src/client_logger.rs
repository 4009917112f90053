//! Logging trait for completion client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! every request and response passing through the [`OpenAi`](crate::OpenAi)
//! client.

use crate::{CompletionRequest, CompletionResponse};

/// A trait for logging completion requests.
///
/// # Example
///
/// ```rust,ignore
/// use chatterpi::{ClientLogger, CompletionRequest, CompletionResponse};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, request: &CompletionRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_response(&self, response: &CompletionResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", serde_json::to_string(response).unwrap()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request right before it is sent.
    fn log_request(&self, request: &CompletionRequest);

    /// Log a successfully parsed response.
    ///
    /// Called for every 2xx response that decodes, including ones whose
    /// `choices` array turns out to be empty.
    fn log_response(&self, response: &CompletionResponse);
}
