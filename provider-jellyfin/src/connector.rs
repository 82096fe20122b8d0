//! Jellyfin API connector implementation
//!
//! Implements the `MediaServer` trait over the host `HttpClient`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::remote::{MediaServer, RemoteUserData, SystemInfo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{JellyfinError, Result};
use crate::types::{ItemResponse, PlaybackProgressInfo};

/// Header carrying the access token on authenticated requests
const TOKEN_HEADER: &str = "X-Emby-Token";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Jellyfin API connector
///
/// Speaks the small slice of the Jellyfin REST API the offline engine needs.
/// Item ids are sent in Jellyfin's 32-digit hex form.
///
/// # Example
///
/// ```ignore
/// use provider_jellyfin::JellyfinConnector;
/// use bridge_traits::remote::MediaServer;
///
/// let connector = JellyfinConnector::new(http_client, "https://media.example.com", user_id, token)?;
/// let info = connector.get_public_system_info().await?;
/// ```
pub struct JellyfinConnector {
    http_client: Arc<dyn HttpClient>,

    /// Base URL without trailing slash
    base_url: String,

    user_id: Uuid,

    access_token: String,

    /// Policy for authenticated calls; the reachability probe never retries
    retry_policy: RetryPolicy,
}

impl JellyfinConnector {
    /// Create a new connector.
    ///
    /// Fails if `base_url` is not an absolute http(s) URL.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: &str,
        user_id: Uuid,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            http_client,
            base_url: Self::normalize_base_url(base_url)?,
            user_id,
            access_token: access_token.into(),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn normalize_base_url(base_url: &str) -> Result<String> {
        let parsed = reqwest::Url::parse(base_url.trim()).map_err(|e| {
            JellyfinError::InvalidBaseUrl {
                url: base_url.to_string(),
                message: e.to_string(),
            }
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(JellyfinError::InvalidBaseUrl {
                url: base_url.to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(parsed.as_str().trim_end_matches('/').to_string())
    }

    fn item_key(item_id: Uuid) -> String {
        item_id.simple().to_string()
    }

    fn user_key(&self) -> String {
        self.user_id.simple().to_string()
    }

    fn authed(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, self.access_token.clone())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if response.is_success() {
            Ok(response)
        } else {
            let message = response
                .text()
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            warn!(status = response.status, "Jellyfin request failed");
            Err(JellyfinError::ApiError {
                status_code: response.status,
                message,
            })
        }
    }

    #[instrument(skip(self))]
    async fn fetch_item(&self, item_id: Uuid) -> Result<ItemResponse> {
        let path = format!(
            "/Users/{}/Items/{}",
            self.user_key(),
            Self::item_key(item_id)
        );
        let response = match self.send(self.authed(HttpMethod::Get, &path)).await {
            Err(JellyfinError::ApiError {
                status_code: 404, ..
            }) => {
                return Err(JellyfinError::ItemNotFound {
                    item_id: item_id.to_string(),
                })
            }
            other => other?,
        };

        response
            .json::<ItemResponse>()
            .map_err(|e| JellyfinError::ParseError(e.to_string()))
    }

    /// POST marks, DELETE clears.
    async fn set_flag(&self, collection: &str, item_id: Uuid, value: bool) -> Result<()> {
        let method = if value {
            HttpMethod::Post
        } else {
            HttpMethod::Delete
        };
        let path = format!(
            "/Users/{}/{}/{}",
            self.user_key(),
            collection,
            Self::item_key(item_id)
        );

        self.send(self.authed(method, &path)).await?;
        debug!(collection, value, "Updated user item flag");
        Ok(())
    }

    async fn report_position(&self, item_id: Uuid, position_ticks: i64) -> Result<()> {
        let body = PlaybackProgressInfo {
            item_id: Self::item_key(item_id),
            position_ticks,
            is_paused: true,
        };
        let request = self
            .authed(HttpMethod::Post, "/Sessions/Playing/Progress")
            .json(&body)?;

        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaServer for JellyfinConnector {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_public_system_info(&self) -> bridge_traits::error::Result<SystemInfo> {
        let request = HttpRequest::new(
            HttpMethod::Get,
            format!("{}/System/Info/Public", self.base_url),
        )
        .header("Accept", "application/json")
        .timeout(PROBE_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await?
            .error_for_status()?;

        let info: SystemInfo = response.json()?;
        info!(
            server = info.server_name.as_deref().unwrap_or("unknown"),
            version = info.version.as_deref().unwrap_or("unknown"),
            "Media server reachable"
        );
        Ok(info)
    }

    #[instrument(skip(self))]
    async fn get_user_data(&self, item_id: Uuid) -> bridge_traits::error::Result<RemoteUserData> {
        let item = self.fetch_item(item_id).await?;
        Ok(item.user_data.unwrap_or_default().into())
    }

    #[instrument(skip(self, data))]
    async fn push_user_data(
        &self,
        item_id: Uuid,
        data: &RemoteUserData,
    ) -> bridge_traits::error::Result<()> {
        self.set_flag("PlayedItems", item_id, data.played).await?;
        self.set_flag("FavoriteItems", item_id, data.favorite).await?;
        self.report_position(item_id, data.playback_position_ticks)
            .await?;

        debug!(played = data.played, favorite = data.favorite, "Pushed user data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bytes::Bytes;
    use mockall::{mock, Sequence};
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn user_id() -> Uuid {
        Uuid::parse_str("11111111-2222-3333-4444-555555555555").unwrap()
    }

    fn item_id() -> Uuid {
        Uuid::parse_str("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee").unwrap()
    }

    fn connector(mock: MockHttpClient) -> JellyfinConnector {
        JellyfinConnector::new(Arc::new(mock), "http://media.local:8096/", user_id(), "token")
            .unwrap()
            .with_retry_policy(RetryPolicy::no_retry())
    }

    #[test]
    fn test_base_url_normalization() {
        let c = connector(MockHttpClient::new());
        assert_eq!(c.base_url(), "http://media.local:8096");

        let bad = JellyfinConnector::new(
            Arc::new(MockHttpClient::new()),
            "ftp://media.local",
            user_id(),
            "token",
        );
        assert!(matches!(bad, Err(JellyfinError::InvalidBaseUrl { .. })));

        let garbage =
            JellyfinConnector::new(Arc::new(MockHttpClient::new()), "not a url", user_id(), "t");
        assert!(garbage.is_err());
    }

    #[tokio::test]
    async fn test_public_system_info_success() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url == "http://media.local:8096/System/Info/Public"
                    && !req.headers.contains_key(TOKEN_HEADER)
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"Id":"srv","ServerName":"Living Room","Version":"10.8.13"}"#,
                ))
            });

        let info = connector(mock_http).get_public_system_info().await.unwrap();
        assert_eq!(info.server_name.as_deref(), Some("Living Room"));
    }

    #[tokio::test]
    async fn test_public_system_info_unreachable() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Unreachable("connection refused".into())));

        let err = connector(mock_http)
            .get_public_system_info()
            .await
            .unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn test_public_system_info_server_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(503, "starting")));

        let err = connector(mock_http)
            .get_public_system_info()
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_get_user_data() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                req.url
                    == "http://media.local:8096/Users/11111111222233334444555555555555/Items/aaaaaaaabbbbccccddddeeeeeeeeeeee"
                    && req.headers.get(TOKEN_HEADER) == Some(&"token".to_string())
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"Id":"aaaaaaaabbbbccccddddeeeeeeeeeeee","UserData":{"Played":true,"IsFavorite":true,"PlaybackPositionTicks":0,"UnplayedItemCount":0}}"#,
                ))
            });

        let data = connector(mock_http).get_user_data(item_id()).await.unwrap();
        assert_eq!(
            data,
            RemoteUserData {
                played: true,
                favorite: true,
                playback_position_ticks: 0,
                unplayed_item_count: Some(0),
            }
        );
    }

    #[tokio::test]
    async fn test_get_user_data_not_found() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, "")));

        let err = connector(mock_http)
            .get_user_data(item_id())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_get_user_data_malformed_body() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "<html>")));

        let err = connector(mock_http)
            .get_user_data(item_id())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }

    #[tokio::test]
    async fn test_push_user_data_sequence() {
        let mut seq = Sequence::new();
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute()
            .withf(|req| req.method == HttpMethod::Post && req.url.contains("/PlayedItems/"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, "{}")));
        mock_http
            .expect_execute()
            .withf(|req| req.method == HttpMethod::Delete && req.url.contains("/FavoriteItems/"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, "{}")));
        mock_http
            .expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url.ends_with("/Sessions/Playing/Progress")
                    && req
                        .body
                        .as_ref()
                        .map(|b| String::from_utf8_lossy(b).contains("\"PositionTicks\":600"))
                        .unwrap_or(false)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(204, "")));

        let data = RemoteUserData {
            played: true,
            favorite: false,
            playback_position_ticks: 600,
            unplayed_item_count: None,
        };
        connector(mock_http)
            .push_user_data(item_id(), &data)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_user_data_stops_on_failure() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, "Unauthorized")));

        let err = connector(mock_http)
            .push_user_data(item_id(), &RemoteUserData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::HttpStatus { status: 401, .. }));
    }
}
