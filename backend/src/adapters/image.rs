use reqwest::Client;

/// Downloads incident images from the image host.
pub struct ImageFetcher {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Image host returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("Image is empty: {0}")]
    Empty(String),
}

impl ImageFetcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve an image name to a URL. Absolute URLs are used as-is.
    pub fn image_url(&self, image_name: &str) -> String {
        if image_name.starts_with("http://") || image_name.starts_with("https://") {
            image_name.to_string()
        } else {
            format!("{}/{}", self.base_url, image_name.trim_start_matches('/'))
        }
    }

    pub async fn fetch(&self, image_name: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.image_url(image_name);

        tracing::debug!("Fetching image: {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        if bytes.is_empty() {
            return Err(FetchError::Empty(url));
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_image_url() {
        let fetcher = ImageFetcher::new("http://images.test/uploads/");
        assert_eq!(fetcher.image_url("a.jpg"), "http://images.test/uploads/a.jpg");
        assert_eq!(fetcher.image_url("/a.jpg"), "http://images.test/uploads/a.jpg");
        assert_eq!(fetcher.image_url("https://cdn.test/b.png"), "https://cdn.test/b.png");
    }

    #[tokio::test]
    async fn test_fetch_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(&format!("{}/uploads", server.uri()));
        assert_eq!(fetcher.fetch("a.jpg").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_missing_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(&server.uri());
        let err = fetcher.fetch("missing.jpg").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
