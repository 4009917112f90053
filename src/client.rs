use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_EMPTY_COMPLETIONS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
};
use crate::types::{CompletionRequest, CompletionResponse, Model};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_TOKENS: u32 = 256;
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// A backend that turns a prompt into a completion.
///
/// Implementations perform exactly one attempt per call and keep no state
/// between calls.  [`OpenAi`] is the HTTP implementation; tests and
/// alternative providers plug in by implementing this trait.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete `prompt`, which is passed through unmodified.
    ///
    /// A successful return always carries at least one choice; a backend
    /// reply with no choices is [`Error::EmptyCompletion`].
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse>;
}

#[async_trait::async_trait]
impl<C: CompletionClient + ?Sized> CompletionClient for Arc<C> {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse> {
        (**self).complete(prompt).await
    }
}

/// Client for the OpenAI-style `/completions` endpoint.
#[derive(Clone)]
pub struct OpenAi {
    authorization: HeaderValue,
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    model: Model,
    max_tokens: u32,
    temperature: Option<f32>,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl OpenAi {
    /// Create a new client against the public API.
    ///
    /// The API key can be provided directly or read from the OPENAI_API_KEY
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with a custom endpoint root and timeout.
    ///
    /// `base_url` is the root under which `completions` lives, e.g.
    /// `http://localhost:8080/v1/`.  A missing trailing slash is added.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_VAR).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_VAR} environment variable not set"
                ))
            })?,
        };
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| {
                Error::validation(
                    "API key contains characters not allowed in a header",
                    Some("api_key".to_string()),
                )
            })?;
        authorization.set_sensitive(true);

        let endpoint = completions_endpoint(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            authorization,
            client,
            endpoint,
            timeout,
            model: Model::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            logger: None,
        })
    }

    /// Sets the model requested on every call.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the maximum tokens per completion.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Installs a logger that sees every request and parsed response.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// The model requested on every call.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::AUTHORIZATION, self.authorization.clone());
        headers
    }

    /// Build the request `complete` sends for `prompt`.
    pub fn request_for(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest::new(self.model.clone(), prompt, self.max_tokens)
            .with_temperature(self.temperature)
    }

    /// Send a completion request and return the parsed response.
    pub async fn send(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            prompt_len = request.prompt.len(),
            "sending completion request"
        );

        let start = Instant::now();
        let result = self.send_once(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if let Err(err) = &result {
            CLIENT_REQUEST_ERRORS.click();
            tracing::debug!(kind = %err.kind(), error = %err, "completion request failed");
        }
        result
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.text().await.map_err(|e| {
            Error::http_client(
                format!("Failed to read response body: {}", e),
                Some(Box::new(e)),
            )
        })?;
        let completion: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })?;

        if let Some(logger) = &self.logger {
            logger.log_response(&completion);
        }
        if completion.choices.is_empty() {
            CLIENT_EMPTY_COMPLETIONS.click();
            return Err(Error::empty_completion(
                completion.response_id().map(String::from),
            ));
        }
        Ok(completion)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.trim().parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            param: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_param = detail.as_ref().and_then(|e| e.param.clone());
        let error_message = detail
            .and_then(|e| e.message)
            .unwrap_or_else(|| error_body.clone());

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(status_code, error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message),
        }
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAi {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse> {
        let request = self.request_for(prompt);
        self.send(&request).await
    }
}

impl fmt::Debug for OpenAi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAi")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

fn completions_endpoint(base_url: &str) -> Result<Url> {
    let base_url = base_url.trim();
    let base = if base_url.ends_with('/') {
        Url::parse(base_url)?
    } else {
        Url::parse(&format!("{base_url}/"))?
    };
    Ok(base.join("completions")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn client_creation() {
        let client = OpenAi::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/completions");
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert_eq!(client.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(client.model(), &Model::default());

        let client = OpenAi::with_options(
            Some("test-key".to_string()),
            Some("http://localhost:8080/v1".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/completions");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = OpenAi::with_options(Some("k".to_string()), Some("not a url".to_string()), None)
            .unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn rejects_header_unsafe_key() {
        let err = OpenAi::new(Some("bad\nkey".to_string())).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn headers_carry_bearer_key() {
        let client = OpenAi::new(Some("sk-test".to_string())).unwrap();
        let headers = client.default_headers();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer sk-test");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn request_uses_configured_parameters() {
        let client = OpenAi::new(Some("k".to_string()))
            .unwrap()
            .with_model(KnownModel::Davinci002.into())
            .with_max_tokens(42)
            .with_temperature(Some(0.2));
        let request = client.request_for("");
        assert_eq!(request.model, Model::Known(KnownModel::Davinci002));
        assert_eq!(request.prompt, "");
        assert_eq!(request.max_tokens, 42);
        assert_eq!(request.temperature, Some(0.2));
    }

    #[test]
    fn debug_hides_key() {
        let client = OpenAi::new(Some("sk-secret".to_string())).unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }
}
