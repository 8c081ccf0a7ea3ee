//! [Swarmer] that asks bootstrap nodes where a darknode listens.

use commonware_utils::hex;
use darkpool_ingress::{Address, Error, MultiAddress, Swarmer};
use futures::future::{select_ok, BoxFuture, FutureExt};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::trace;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    multi_address: String,
}

/// Queries up to `alpha` bootstrap nodes concurrently. The first answer wins.
#[derive(Clone)]
pub struct Client {
    bootstrap: Arc<Vec<String>>,
    alpha: usize,
    client: HttpClient,
}

impl Client {
    pub fn new(bootstrap: Vec<String>, alpha: usize, timeout: Duration) -> Result<Self, Error> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Discovery(err.to_string()))?;
        let bootstrap = bootstrap
            .into_iter()
            .map(|base| base.trim_end_matches('/').to_string())
            .collect();
        Ok(Self {
            bootstrap: Arc::new(bootstrap),
            alpha: alpha.max(1),
            client,
        })
    }

    async fn ask(client: HttpClient, url: String) -> Result<MultiAddress, Error> {
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|err| Error::Discovery(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Discovery(format!("{url}: {status} {body}")));
        }
        let response = response
            .json::<QueryResponse>()
            .await
            .map_err(|err| Error::Discovery(err.to_string()))?;
        Ok(MultiAddress(response.multi_address))
    }
}

impl Swarmer for Client {
    async fn query(&self, address: Address) -> Result<MultiAddress, Error> {
        let queries: Vec<BoxFuture<'static, Result<MultiAddress, Error>>> = self
            .bootstrap
            .iter()
            .take(self.alpha)
            .map(|base| {
                let url = format!("{base}/query?address={}", hex(address.as_ref()));
                Self::ask(self.client.clone(), url).boxed()
            })
            .collect();
        if queries.is_empty() {
            return Err(Error::Discovery("no bootstrap nodes".into()));
        }
        let (resolved, _) = select_ok(queries).await?;
        trace!(%address, %resolved, "resolved darknode");
        Ok(resolved)
    }
}
