use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, HttpError};
use crate::navigator::{LoginRedirect, MemoryHistory, Navigator};

/// Response body after content-type sniffing.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// JSON-parse `text` when the content type says JSON and the body is
    /// non-empty. Malformed JSON is kept as text.
    pub fn from_text(text: String, content_type: &str) -> Self {
        if content_type.contains("application/json") && !text.is_empty() {
            if let Ok(value) = serde_json::from_str(&text) {
                return ResponseBody::Json(value);
            }
            tracing::debug!(content_type, "Response claimed JSON but did not parse");
        }
        ResponseBody::Text(text)
    }

    /// Decode into `T`. A text body is decoded as a JSON string.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        match self {
            ResponseBody::Json(value) => serde_json::from_value(value),
            ResponseBody::Text(text) => serde_json::from_value(Value::String(text)),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

/// Outcome of a request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    /// 204; the body was not read.
    NoContent,
    /// 401; the navigator was sent to the login page and the caller should
    /// stop work for the current page.
    Redirected(LoginRedirect),
}

impl<T> Fetched<T> {
    pub fn data(self) -> Option<T> {
        match self {
            Fetched::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_redirected(&self) -> bool {
        matches!(self, Fetched::Redirected(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Data(data) => Fetched::Data(f(data)),
            Fetched::NoContent => Fetched::NoContent,
            Fetched::Redirected(redirect) => Fetched::Redirected(redirect),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Fetched<U>, E> {
        Ok(match self {
            Fetched::Data(data) => Fetched::Data(f(data)?),
            Fetched::NoContent => Fetched::NoContent,
            Fetched::Redirected(redirect) => Fetched::Redirected(redirect),
        })
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    /// Sent after the defaults and replacing any default of the same name.
    pub headers: HeaderMap,
    pub body: Option<String>,
    /// Return the 401 as an [`HttpError`] instead of redirecting to login.
    pub skip_redirect_on_401: bool,
}

impl FetchOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    pub fn skip_redirect_on_401(mut self) -> Self {
        self.skip_redirect_on_401 = true;
        self
    }

    /// Default headers merged with the caller's.
    fn request_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if self.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for name in self.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
        headers
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    navigator: Option<Arc<dyn Navigator>>,
    timeout: Option<Duration>,
    http: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a preconfigured HTTP client. It should keep cookies; the
    /// session depends on them.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.base_url)))?;

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = reqwest::Client::builder().cookie_store(true);
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        Ok(ApiClient {
            http,
            base_url,
            navigator: self
                .navigator
                .unwrap_or_else(|| Arc::new(MemoryHistory::default())),
        })
    }
}

/// JSON API client that carries the session cookie, parses bodies
/// uniformly, and turns a 401 into a login redirect.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            navigator: None,
            timeout: None,
            http: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    fn resolve(&self, url: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(url)
            .map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))
    }

    /// Send a request and classify the response.
    ///
    /// Dropping the request when `cancel` fires aborts it and yields
    /// [`ClientError::Cancelled`].
    pub async fn fetch(
        &self,
        url: &str,
        options: FetchOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<Fetched<ResponseBody>, ClientError> {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(url, "Request cancelled");
                        Err(ClientError::Cancelled)
                    }
                    result = self.execute(url, options) => result,
                }
            }
            None => self.execute(url, options).await,
        }
    }

    async fn execute(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> Result<Fetched<ResponseBody>, ClientError> {
        let target = self.resolve(url)?;
        let mut request = self
            .http
            .request(options.method.clone(), target)
            .headers(options.request_headers());
        if let Some(body) = options.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(Fetched::NoContent);
        }

        if status == StatusCode::UNAUTHORIZED && !options.skip_redirect_on_401 {
            let redirect = LoginRedirect::for_location(&self.navigator.current_location());
            tracing::info!(url, to = %redirect.href, "Not signed in, redirecting to login");
            self.navigator.navigate(&redirect.href);
            return Ok(Fetched::Redirected(redirect));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await?;
        let body = ResponseBody::from_text(text, &content_type);

        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "Request failed");
            return Err(HttpError {
                status,
                url: url.to_string(),
                body,
            }
            .into());
        }

        Ok(Fetched::Data(body))
    }

    /// [`ApiClient::fetch`] and decode the body into `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: FetchOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<Fetched<T>, ClientError> {
        let fetched = self.fetch(url, options, cancel).await?;
        Ok(fetched.try_map(ResponseBody::decode)?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Fetched<T>, ClientError> {
        self.fetch_json(url, FetchOptions::default(), None).await
    }
}
