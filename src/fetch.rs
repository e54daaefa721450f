use crate::field_location::FieldLocation;
use bytes::Bytes;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_IMAGERY_API: &str = "https://api.nasa.gov/planetary/earth/imagery";

/// One imagery request for a single location and date.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub location: &'a FieldLocation,
    pub date: NaiveDate,
    pub api_key: &'a str,
}

impl FetchRequest<'_> {
    pub fn query_params(&self) -> [(&'static str, String); 5] {
        [
            ("lon", self.location.longitude.to_string()),
            ("lat", self.location.latitude.to_string()),
            ("date", self.date.to_string()),
            ("dim", self.location.dimension.to_string()),
            ("api_key", self.api_key.to_string()),
        ]
    }
}

#[derive(Debug)]
pub enum FetchResult {
    Success(Bytes),
    Absent(AbsentReason),
}

impl FetchResult {
    pub fn is_absent(&self) -> bool {
        matches!(self, FetchResult::Absent(_))
    }
}

/// Why no usable image came back. None of these abort a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsentReason {
    NotFound,
    Status(u16),
    Connect(String),
    Timeout(String),
    Request(String),
}

#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl ImageFetcher {
    pub fn new(endpoint: Url, api_key: &str) -> Self {
        Self::with_client(Client::new(), endpoint, api_key)
    }

    pub fn with_timeout(
        endpoint: Url,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint, api_key))
    }

    pub fn with_client(client: Client, endpoint: Url, api_key: &str) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches imagery for one location. Every HTTP or transport failure is
    /// logged and folded into [`FetchResult::Absent`].
    pub async fn fetch(&self, location: &FieldLocation, date: NaiveDate) -> FetchResult {
        let request = FetchRequest {
            location,
            date,
            api_key: &self.api_key,
        };
        self.send(&request).await
    }

    async fn send(&self, request: &FetchRequest<'_>) -> FetchResult {
        let location = request.location;
        let response = match self
            .client
            .get(self.endpoint.clone())
            .query(&request.query_params())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return absent_from_transport(request, e),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!(
                field_id = %location.field_id,
                lon = location.longitude,
                lat = location.latitude,
                date = %request.date,
                "Image not found. Skipping it."
            );
            return FetchResult::Absent(AbsentReason::NotFound);
        }
        if !status.is_success() {
            warn!(
                field_id = %location.field_id,
                lon = location.longitude,
                lat = location.latitude,
                date = %request.date,
                status = status.as_u16(),
                "API request failed"
            );
            return FetchResult::Absent(AbsentReason::Status(status.as_u16()));
        }

        match response.bytes().await {
            Ok(body) => {
                info!(
                    field_id = %location.field_id,
                    lon = location.longitude,
                    lat = location.latitude,
                    date = %request.date,
                    size_bytes = body.len(),
                    "Image found. Uploading it."
                );
                FetchResult::Success(body)
            }
            Err(e) => absent_from_transport(request, e),
        }
    }
}

fn absent_from_transport(request: &FetchRequest<'_>, err: reqwest::Error) -> FetchResult {
    let location = request.location;
    let (kind, reason) = if err.is_timeout() {
        ("Timeout error", AbsentReason::Timeout(err.to_string()))
    } else if err.is_connect() {
        ("Connection error", AbsentReason::Connect(err.to_string()))
    } else {
        ("Request error", AbsentReason::Request(err.to_string()))
    };
    warn!(
        field_id = %location.field_id,
        lon = location.longitude,
        lat = location.latitude,
        date = %request.date,
        error = %err,
        "{kind} occurred during the API request"
    );
    FetchResult::Absent(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, 15).unwrap()
    }

    fn fetcher_for(server: &mockito::Server) -> ImageFetcher {
        let endpoint = Url::parse(&format!("{}/imagery", server.url())).unwrap();
        ImageFetcher::new(endpoint, "DEMO_KEY")
    }

    #[test]
    fn test_query_params() {
        let location = FieldLocation::new("F1", 24.0, 45.5, 0.32);
        let request = FetchRequest {
            location: &location,
            date: date(),
            api_key: "DEMO_KEY",
        };
        let params = request.query_params();
        assert_eq!(params[0], ("lon", "45.5".to_string()));
        assert_eq!(params[1], ("lat", "24".to_string()));
        assert_eq!(params[2], ("date", "2023-06-15".to_string()));
        assert_eq!(params[3], ("dim", "0.32".to_string()));
        assert_eq!(params[4], ("api_key", "DEMO_KEY".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/imagery")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("lon".into(), "45.5".into()),
                Matcher::UrlEncoded("lat".into(), "24".into()),
                Matcher::UrlEncoded("date".into(), "2023-06-15".into()),
                Matcher::UrlEncoded("dim".into(), "0.32".into()),
                Matcher::UrlEncoded("api_key".into(), "DEMO_KEY".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("Mock Image Content")
            .create_async()
            .await;

        let location = FieldLocation::new("F1", 24.0, 45.5, 0.32);
        let result = fetcher_for(&server).fetch(&location, date()).await;

        mock.assert_async().await;
        match result {
            FetchResult::Success(body) => assert_eq!(body, Bytes::from_static(b"Mock Image Content")),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/imagery")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let location = FieldLocation::new("F2", -12.0, 54.0, 0.06);
        let result = fetcher_for(&server).fetch(&location, date()).await;
        assert!(matches!(result, FetchResult::Absent(AbsentReason::NotFound)));
    }

    #[tokio::test]
    async fn test_fetch_other_status_is_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/imagery")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let location = FieldLocation::new("F2", -12.0, 54.0, 0.06);
        let result = fetcher_for(&server).fetch(&location, date()).await;
        assert!(matches!(result, FetchResult::Absent(AbsentReason::Status(500))));
    }

    #[tokio::test]
    async fn test_fetch_connection_error_is_absent() {
        // Nothing listens on port 1
        let endpoint = Url::parse("http://127.0.0.1:1/imagery").unwrap();
        let fetcher = ImageFetcher::new(endpoint, "DEMO_KEY");

        let location = FieldLocation::new("F2", -12.0, 54.0, 0.06);
        let result = fetcher.fetch(&location, date()).await;
        assert!(matches!(result, FetchResult::Absent(AbsentReason::Connect(_))));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_absent() {
        // Connections land in the accept backlog but nothing ever answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint =
            Url::parse(&format!("http://{}/imagery", listener.local_addr().unwrap())).unwrap();
        let fetcher =
            ImageFetcher::with_timeout(endpoint, "DEMO_KEY", Duration::from_millis(300)).unwrap();

        let location = FieldLocation::new("F2", -12.0, 54.0, 0.06);
        let result = fetcher.fetch(&location, date()).await;
        assert!(matches!(result, FetchResult::Absent(AbsentReason::Timeout(_))));
        drop(listener);
    }

    #[tokio::test]
    async fn test_fetch_request_error_is_absent() {
        // An unsupported scheme fails before any connection attempt
        let endpoint = Url::parse("ftp://127.0.0.1/imagery").unwrap();
        let fetcher = ImageFetcher::new(endpoint, "DEMO_KEY");

        let location = FieldLocation::new("F2", -12.0, 54.0, 0.06);
        let result = fetcher.fetch(&location, date()).await;
        assert!(result.is_absent());
    }
}
