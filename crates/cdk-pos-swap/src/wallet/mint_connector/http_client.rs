use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, IntoUrl};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use super::{Error, MintConnector};
use crate::error::ErrorResponse;
use crate::mint_url::MintUrl;
use crate::nuts::{
    Id, KeySet, KeysResponse, KeysetResponse, MeltQuoteBolt11Request, MeltQuoteBolt11Response,
    MeltRequest,
};

/// Per request timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct HttpClientCore {
    inner: Client,
}

impl HttpClientCore {
    fn new(timeout: Duration) -> Result<Self, Error> {
        let inner = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::HttpError(None, e.to_string()))?;

        Ok(Self { inner })
    }

    fn client(&self) -> &Client {
        &self.inner
    }

    async fn http_get<U: IntoUrl + Send, R: DeserializeOwned>(&self, url: U) -> Result<R, Error> {
        let response = self
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| {
                Error::HttpError(
                    e.status().map(|status_code| status_code.as_u16()),
                    e.to_string(),
                )
            })?
            .text()
            .await
            .map_err(|e| {
                Error::HttpError(
                    e.status().map(|status_code| status_code.as_u16()),
                    e.to_string(),
                )
            })?;

        Self::parse_response(&response)
    }

    async fn http_post<U: IntoUrl + Send, P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: U,
        payload: &P,
    ) -> Result<R, Error> {
        let response = self
            .client()
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::HttpError(
                    e.status().map(|status_code| status_code.as_u16()),
                    e.to_string(),
                )
            })?;

        let response = response.text().await.map_err(|e| {
            Error::HttpError(
                e.status().map(|status_code| status_code.as_u16()),
                e.to_string(),
            )
        })?;

        Self::parse_response(&response)
    }

    fn parse_response<R: DeserializeOwned>(response: &str) -> Result<R, Error> {
        serde_json::from_str::<R>(response).map_err(|err| {
            tracing::warn!("Http Response error: {}", err);
            match ErrorResponse::from_json(response) {
                Ok(ok) => <ErrorResponse as Into<Error>>::into(ok),
                Err(err) => err.into(),
            }
        })
    }
}

/// Http Client
#[derive(Debug, Clone)]
pub struct HttpClient {
    core: HttpClientCore,
    mint_url: MintUrl,
}

impl HttpClient {
    /// Create new [`HttpClient`] with [`DEFAULT_TIMEOUT`]
    pub fn new(mint_url: MintUrl) -> Result<Self, Error> {
        Self::with_timeout(mint_url, DEFAULT_TIMEOUT)
    }

    /// Create new [`HttpClient`] whose requests fail after `timeout`
    pub fn with_timeout(mint_url: MintUrl, timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            core: HttpClientCore::new(timeout)?,
            mint_url,
        })
    }
}

#[async_trait]
impl MintConnector for HttpClient {
    /// Get Keysets [NUT-02]
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_mint_keysets(&self) -> Result<KeysetResponse, Error> {
        let url = self.mint_url.join_paths(&["v1", "keysets"])?;
        self.core.http_get(url).await
    }

    /// Get Keyset Keys [NUT-01]
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_mint_keyset(&self, keyset_id: &Id) -> Result<KeySet, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "keys", &keyset_id.to_string()])?;

        let keys_response = self.core.http_get::<_, KeysResponse>(url).await?;

        keys_response
            .keysets
            .into_iter()
            .find(|keyset| &keyset.id == keyset_id)
            .ok_or_else(|| Error::UnknownKeySet(keyset_id.to_string()))
    }

    /// Melt Quote [NUT-05]
    #[instrument(skip(self, request), fields(mint_url = %self.mint_url))]
    async fn post_melt_quote(
        &self,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "melt", "quote", "bolt11"])?;
        self.core.http_post(url, &request).await
    }

    /// Melt Quote Status
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_melt_quote_status(
        &self,
        quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "melt", "quote", "bolt11", quote_id])?;
        self.core.http_get(url).await
    }

    /// Melt [NUT-05]
    /// [Nut-08] Lightning fee return if outputs defined
    #[instrument(skip(self, request), fields(mint_url = %self.mint_url))]
    async fn post_melt(&self, request: MeltRequest) -> Result<MeltQuoteBolt11Response, Error> {
        let url = self.mint_url.join_paths(&["v1", "melt", "bolt11"])?;
        self.core.http_post(url, &request).await
    }
}
