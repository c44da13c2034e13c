// Hand-crafted async HTTP client for the Cirro provider API (v4).
//
// Base path: /v4/
// Auth: `Authorization: Bearer <token>` header
//
// Unlike a typed SDK, the verb surface here is public and payload-agnostic:
// the state layer above derives endpoint paths from resource configs and
// treats entities as opaque JSON documents.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::types::{ErrorResponse, Page};

/// Header carrying the collection filter, JSON-encoded.
pub const FILTER_HEADER: &str = "X-Filter";

/// Async client for the Cirro provider API.
///
/// Cheap to clone; all request state lives in the inner `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a personal access token and transport config.
    ///
    /// Installs `Authorization: Bearer <token>` as a default header on
    /// every request.
    pub fn from_token(
        base_url: &str,
        token: &secrecy::SecretString,
        transport: &crate::TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| Error::InvalidToken)?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Ensure the base URL ends with `/v4/` so relative joins work.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/v4") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/v4/"));
        }

        Ok(url)
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"instances/42/ips"`) onto the base URL.
    ///
    /// Leading slashes are stripped so callers can pass either form
    /// without clobbering the base path.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    /// GET a single JSON document.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    /// GET one page of a collection, optionally filtered.
    ///
    /// `page` is 1-based; `None` means the server default (first page).
    /// The filter, when present, is JSON-encoded into the `X-Filter`
    /// header as the API expects.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: Option<u32>,
        filter: Option<&Value>,
    ) -> Result<Page<T>, Error> {
        let url = self.url(path)?;
        debug!("GET {url} page={page:?} filtered={}", filter.is_some());

        let mut req = self.http.get(url);
        if let Some(page) = page {
            req = req.query(&[("page", page.to_string())]);
        }
        if let Some(filter) = filter {
            let encoded = serde_json::to_string(filter).map_err(|e| Error::Deserialization {
                message: format!("unencodable filter: {e}"),
                body: String::new(),
            })?;
            req = req.header(FILTER_HEADER, encoded);
        }

        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    /// POST a JSON body, returning the created document.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    /// POST with no body of interest in the response.
    pub async fn post_no_response<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_empty(resp).await
    }

    /// PUT a JSON body, returning the updated document.
    pub async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self.http.put(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    /// DELETE, expecting an empty (or ignorable) response body.
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.http.delete(url).send().await?;
        self.handle_empty(resp).await
    }

    // ── Pagination helper ────────────────────────────────────────────

    /// Collect every page of a collection into a single `Vec<T>`.
    ///
    /// Pages are requested strictly sequentially. If the server reports a
    /// different page count mid-way (the collection changed under us),
    /// the walk restarts from the first page once.
    pub async fn paginate_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&Value>,
    ) -> Result<Vec<T>, Error> {
        let mut restarted = false;

        'restart: loop {
            let first: Page<T> = self.get_page(path, Some(1), filter).await?;
            let pages = first.pages;
            let mut all = first.data;

            for page in 2..=pages {
                let next: Page<T> = self.get_page(path, Some(page), filter).await?;
                if next.pages != pages && !restarted {
                    debug!(path, "page count changed mid-pagination, restarting");
                    restarted = true;
                    continue 'restart;
                }
                all.extend(next.data);
            }

            return Ok(all);
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = &body[..body.len().min(200)];
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::InvalidToken;
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return Error::RateLimited { retry_after_secs };
        }

        let raw = resp.text().await.unwrap_or_default();
        let parsed: ErrorResponse = serde_json::from_str(&raw).unwrap_or_default();

        if status == reqwest::StatusCode::FORBIDDEN {
            return Error::AccessDenied {
                message: parsed
                    .errors
                    .first()
                    .map_or_else(|| status.to_string(), |e| e.reason.clone()),
            };
        }

        let message = if parsed.errors.is_empty() {
            if raw.is_empty() {
                status.to_string()
            } else {
                raw
            }
        } else {
            parsed
                .errors
                .iter()
                .map(|e| e.reason.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };

        Error::Api {
            status: status.as_u16(),
            message,
            errors: parsed.errors,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_version_prefix() {
        let client =
            ApiClient::from_reqwest("https://api.cirrostack.dev", reqwest::Client::new()).unwrap();
        assert_eq!(client.base_url.as_str(), "https://api.cirrostack.dev/v4/");
    }

    #[test]
    fn base_url_keeps_existing_prefix() {
        let client =
            ApiClient::from_reqwest("https://api.cirrostack.dev/v4/", reqwest::Client::new())
                .unwrap();
        assert_eq!(client.base_url.as_str(), "https://api.cirrostack.dev/v4/");
    }

    #[test]
    fn url_strips_leading_slash() {
        let client =
            ApiClient::from_reqwest("https://api.cirrostack.dev", reqwest::Client::new()).unwrap();
        let url = client.url("/instances/42/ips").unwrap();
        assert_eq!(url.path(), "/v4/instances/42/ips");
    }
}
