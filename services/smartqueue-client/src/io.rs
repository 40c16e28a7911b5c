//! HTTP client abstraction for testability

use async_trait::async_trait;

/// HTTP response from a request
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// `Location` header of a redirect
    pub location: Option<String>,
}

impl HttpResponse {
    /// True for any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for any 3xx status. Redirects are never followed.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// The server wants a signed-in session for this request.
    ///
    /// A form-login server sends unauthenticated callers to its login page
    /// rather than answering 401 or 403.
    pub fn needs_sign_in(&self) -> bool {
        matches!(self.status, 401 | 403) || self.is_redirect()
    }
}

/// Abstraction over HTTP client for dependency injection
///
/// Any response that arrives, whatever its status, is `Ok`. Only requests that
/// never complete (refused, DNS, reset, unreadable body) are `Err`.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL
    async fn get(&self, url: &str) -> crate::Result<HttpResponse>;

    /// Send a POST request without a body
    async fn post(&self, url: &str) -> crate::Result<HttpResponse>;

    /// Send a POST request with a JSON body
    async fn post_json(&self, url: &str, body: &serde_json::Value)
        -> crate::Result<HttpResponse>;

    /// Send a POST request with a urlencoded form body
    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> crate::Result<HttpResponse>;

    /// Send a DELETE request without a body
    async fn delete(&self, url: &str) -> crate::Result<HttpResponse>;

    /// Send a DELETE request with a JSON body
    async fn delete_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
///
/// Keeps the session cookie handed out by the server's login form and hands
/// redirects back to the caller untouched.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .build()
            .map_err(|e| crate::QueueError::Http(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn execute(
        &self,
        method: &str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("{} {}", method, url);
        let response = request
            .send()
            .await
            .map_err(|e| crate::QueueError::Http(format!("{} {} failed: {}", method, url, e)))?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| crate::QueueError::Http(format!("Reading response body: {}", e)))?;

        tracing::debug!("{} {} -> {} ({} bytes)", method, url, status, body.len());
        Ok(HttpResponse {
            status,
            body,
            location,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        self.execute("GET", url, self.client.get(url)).await
    }

    async fn post(&self, url: &str) -> crate::Result<HttpResponse> {
        self.execute("POST", url, self.client.post(url)).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse> {
        self.execute("POST", url, self.client.post(url).json(body))
            .await
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> crate::Result<HttpResponse> {
        self.execute("POST", url, self.client.post(url).form(params))
            .await
    }

    async fn delete(&self, url: &str) -> crate::Result<HttpResponse> {
        self.execute("DELETE", url, self.client.delete(url)).await
    }

    async fn delete_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> crate::Result<HttpResponse> {
        self.execute("DELETE", url, self.client.delete(url).json(body))
            .await
    }
}
