use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::error::ClientError;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Thin transport under the session manager. Knows the base URL and how to
/// attach a bearer credential; knows nothing about sessions.
#[derive(Clone)]
pub(crate) struct HttpClient {
    // Clone is cheap, reqwest::Client is an Arc internally.
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> Result<Response, ClientError> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    pub async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    pub async fn post_empty(
        &self,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self.client.post(self.url(path));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Resolve a response into its JSON body, turning non-success statuses
    /// into [`ClientError::Rejected`].
    pub async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(ClientError::rejected(response).await)
        }
    }

    /// Like [`Self::expect_json`] for endpoints whose body carries nothing
    /// the caller wants.
    pub async fn expect_success(response: Response) -> Result<(), ClientError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::rejected(response).await)
        }
    }
}
