use async_trait::async_trait;
use fleet_core::{
    BoxedError, CachedPosition, CoreResult, SnapshotSource, SnapshotVessel,
    core_error::{FailedRequestSnafu, JsonSnafu, TransportSnafu},
};
use reqwest::{Client, header::AUTHORIZATION};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_tracing::TracingMiddleware;
use serde_json::Value;
use snafu::ResultExt;
use tracing::{info, instrument};
use url::Url;

use crate::{
    error::{
        Result,
        error::{HttpClientSnafu, UrlSnafu},
    },
    models::{parse_cached_positions, parse_fleet},
    settings::Settings,
};

/// Fetches the fleet snapshot and the backend cache of live positions over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: ClientWithMiddleware,
    fleet_url: Url,
    cached_positions_url: Url,
    token: Option<String>,
}

impl HttpSnapshotSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        let inner = Client::builder()
            .timeout(settings.http_timeout)
            .gzip(true)
            .build()
            .context(HttpClientSnafu)?;

        let client = ClientBuilder::new(inner)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(
                ExponentialBackoff::builder().build_with_max_retries(settings.http_max_retries),
            ))
            .build();

        Ok(Self {
            client,
            fleet_url: parse_url(settings.fleet_url())?,
            cached_positions_url: parse_url(settings.cached_positions_url())?,
            token: settings.api_token.clone(),
        })
    }

    async fn download(&self, url: &Url) -> CoreResult<Vec<Value>> {
        let mut req = self.client.get(url.clone());
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = req
            .send()
            .await
            .map_err(BoxedError::from)
            .context(TransportSnafu {
                target: url.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return FailedRequestSnafu {
                url: url.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }
            .fail();
        }

        let body = response
            .bytes()
            .await
            .map_err(BoxedError::from)
            .context(TransportSnafu {
                target: url.to_string(),
            })?;

        serde_json::from_slice(&body).context(JsonSnafu)
    }
}

fn parse_url(url: String) -> Result<Url> {
    Url::parse(&url).context(UrlSnafu { url })
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    #[instrument(skip_all)]
    async fn fleet(&self) -> CoreResult<Vec<SnapshotVessel>> {
        let fleet = parse_fleet(self.download(&self.fleet_url).await?);
        info!("fetched fleet snapshot, vessels: {}", fleet.len());
        Ok(fleet)
    }

    #[instrument(skip_all)]
    async fn cached_positions(&self) -> CoreResult<Vec<CachedPosition>> {
        let positions = parse_cached_positions(self.download(&self.cached_positions_url).await?);
        info!("fetched cached positions, positions: {}", positions.len());
        Ok(positions)
    }
}
