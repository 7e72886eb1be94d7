//! HTTP/HTTPS requests with host allow-listing and response limits

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anvil_foundation::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy as RedirectPolicy;
use reqwest::{Method, Url};
use serde_json::{Map, Value};

use crate::builtin::{opt_bool, opt_int_in_range, opt_str, opt_string_map, require_str};
use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, PropertyDef, ToolSchema};

const MAX_URL_LENGTH: usize = 8192;
const MAX_BODY_LENGTH: usize = 1024 * 1024;
const MAX_RESPONSE_SIZE: i64 = 100 * 1024 * 1024;
const DEFAULT_TIMEOUT_SECS: i64 = 30;
const MAX_TIMEOUT_SECS: i64 = 300;

/// Makes HTTP requests with method and host restrictions
///
/// An empty host allow-list permits any host; a configured list restricts
/// requests to exact host matches.
pub struct HttpRequestTool {
    sandbox: Arc<Sandbox>,
    allowed_hosts: Vec<String>,
}

impl HttpRequestTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self {
            sandbox,
            allowed_hosts: Vec::new(),
        }
    }

    /// Restrict requests to an explicit set of hosts
    pub fn with_allowed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.allowed_hosts = hosts;
        self
    }

    fn validate_host(&self, host: &str) -> Result<()> {
        if self.allowed_hosts.is_empty() || self.allowed_hosts.iter().any(|h| h == host) {
            return Ok(());
        }
        Err(Error::permission_denied(
            "request",
            host,
            format!(
                "host '{}' is not in allowed hosts: [{}]",
                host,
                self.allowed_hosts.join(", ")
            ),
        ))
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Makes HTTP/HTTPS requests with method validation, URL restrictions, and response handling"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::builder()
            .property(
                "url",
                PropertyDef::string(
                    "The URL to make the request to (must start with http:// or https://)",
                )
                .with_max_length(MAX_URL_LENGTH),
                true,
            )
            .property(
                "method",
                PropertyDef::string("HTTP method to use (default: GET)")
                    .with_enum(&["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"])
                    .with_default("GET"),
                false,
            )
            .property(
                "headers",
                PropertyDef::object("HTTP headers to send as key-value pairs"),
                false,
            )
            .property(
                "body",
                PropertyDef::string("Request body content (for POST, PUT, PATCH methods)")
                    .with_max_length(MAX_BODY_LENGTH),
                false,
            )
            .integer_param(
                "timeout_seconds",
                "Request timeout in seconds (default: 30, max: 300)",
                false,
            )
            .property(
                "follow_redirects",
                PropertyDef::boolean("Whether to follow HTTP redirects (default: true)")
                    .with_default(true),
                false,
            )
            .integer_param(
                "max_response_size",
                "Maximum response body size in bytes (default: 10MB, max: 100MB)",
                false,
            )
            .build()
    }

    fn category(&self) -> Category {
        Category::Network
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _policy: &ExecutionPolicy,
        input: Map<String, Value>,
    ) -> Result<ToolResult> {
        let url_str = require_str(&input, "url")?;
        if url_str.is_empty() {
            return Err(Error::invalid_input("url", "url cannot be empty"));
        }

        let url = Url::parse(url_str)
            .map_err(|e| Error::invalid_input("url", format!("invalid URL format: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::invalid_input(
                    "url",
                    format!("url scheme must be http or https, got '{other}'"),
                ));
            }
        }

        let host = url.host_str().unwrap_or_default();
        self.validate_host(host)?;

        let method_str = opt_str(&input, "method")?.unwrap_or("GET").to_uppercase();
        let method = Method::from_bytes(method_str.as_bytes())
            .map_err(|_| Error::invalid_input("method", format!("unsupported method: {method_str}")))?;

        let body = opt_str(&input, "body")?.unwrap_or_default().to_string();

        let mut headers = HeaderMap::new();
        let header_pairs = opt_string_map(&input, "headers")?;
        for (key, value) in &header_pairs {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                Error::invalid_input("headers", format!("invalid header name: {key}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                Error::invalid_input("headers", format!("invalid value for header: {key}"))
            })?;
            headers.insert(name, value);
        }
        if !body.is_empty() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let timeout_secs = opt_int_in_range(
            &input,
            "timeout_seconds",
            DEFAULT_TIMEOUT_SECS,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        let follow_redirects = opt_bool(&input, "follow_redirects", true)?;

        // A sandbox ceiling of 0 means unlimited; fall back to the tool's
        // own maximum so the default stays inside the accepted range.
        let default_response_size = match self.sandbox.max_output_size {
            0 => MAX_RESPONSE_SIZE,
            limit => (limit as i64).min(MAX_RESPONSE_SIZE),
        };
        let max_response_size = opt_int_in_range(
            &input,
            "max_response_size",
            default_response_size,
            1,
            MAX_RESPONSE_SIZE,
        )? as u64;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .redirect(if follow_redirects {
                RedirectPolicy::default()
            } else {
                RedirectPolicy::none()
            })
            .build()
            .map_err(|e| Error::execution_failed_with("failed to build HTTP client", e))?;

        let mut request = client.request(method.clone(), url).headers(headers);
        if !body.is_empty() {
            request = request.body(body.clone());
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    tool: self.name().to_string(),
                    duration: Duration::from_secs(timeout_secs as u64),
                }
            } else {
                Error::execution_failed_with(format!("HTTP request failed: {e}"), e)
            }
        })?;

        let status = response.status();
        let mut response_headers = Map::new();
        for (name, value) in response.headers() {
            response_headers.insert(
                name.to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            );
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::execution_failed_with("failed to read response body", e))?;
        let elapsed = started.elapsed();

        if bytes.len() as u64 > max_response_size {
            return Err(Error::OutputTooLarge {
                tool: self.name().to_string(),
                output_size: bytes.len() as u64,
                max_size: max_response_size,
            });
        }
        let response_body = String::from_utf8_lossy(&bytes).into_owned();

        let mut text = String::new();
        let _ = writeln!(text, "HTTP {method} {url_str}");
        let _ = writeln!(text, "Status: {status}");
        let _ = writeln!(text, "Duration: {}ms", elapsed.as_millis());
        let _ = writeln!(text, "Response Size: {} bytes", bytes.len());
        text.push_str("\n--- RESPONSE HEADERS ---\n");
        for (name, value) in &response_headers {
            let _ = writeln!(text, "{name}: {}", value.as_str().unwrap_or_default());
        }
        text.push_str("\n--- RESPONSE BODY ---\n");
        text.push_str(&response_body);

        let mut metadata = Map::new();
        metadata.insert("url".to_string(), Value::String(url_str.to_string()));
        metadata.insert("method".to_string(), Value::String(method_str));
        metadata.insert("status_code".to_string(), Value::from(status.as_u16()));
        metadata.insert(
            "duration_ms".to_string(),
            Value::from(elapsed.as_millis() as u64),
        );
        metadata.insert("response_size".to_string(), Value::from(bytes.len()));
        metadata.insert(
            "response_headers".to_string(),
            Value::Object(response_headers),
        );
        metadata.insert("content_type".to_string(), Value::String(content_type));
        if !header_pairs.is_empty() {
            metadata.insert(
                "request_headers".to_string(),
                Value::Object(
                    header_pairs
                        .into_iter()
                        .map(|(k, v)| (k, Value::String(v)))
                        .collect(),
                ),
            );
        }
        if !body.is_empty() {
            metadata.insert("request_body_size".to_string(), Value::from(body.len()));
        }

        // Success tracks the status class, not transport health: a 4xx/5xx
        // response is a completed call with a failure result.
        let mut result = if status.is_success() {
            ToolResult::success(text)
        } else {
            let mut r = ToolResult::failure(format!("HTTP status {status}"));
            r.output = text;
            r
        };
        result.metadata = metadata;
        Ok(result)
    }
}
