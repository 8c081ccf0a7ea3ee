//! [Registry] backed by the JSON gateway of the on-chain registry.

use commonware_utils::{from_hex_formatted, hex};
use darkpool_ingress::{
    Address, Epoch, EpochHash, Error, OrderId, Pod, PodHash, Registry, Signature,
};
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpochResponse {
    hash: String,
    block_number: u64,
}

#[derive(Debug, Deserialize)]
struct IntervalResponse {
    interval: u64,
}

#[derive(Debug, Deserialize)]
struct PodResponse {
    hash: String,
    darknodes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest<'a> {
    from: &'a str,
    signature: String,
    order_id: String,
}

#[derive(Debug, Serialize)]
struct TransactionRequest<'a> {
    from: &'a str,
}

fn decode<T>(field: &str, value: &str) -> Result<T, Error>
where
    T: for<'a> TryFrom<&'a [u8], Error = usize>,
{
    let raw = from_hex_formatted(value)
        .ok_or_else(|| Error::Registry(format!("invalid hex in {field}: {value}")))?;
    T::try_from(raw.as_slice())
        .map_err(|len| Error::Registry(format!("invalid length for {field}: {len}")))
}

impl TryFrom<EpochResponse> for Epoch {
    type Error = Error;

    fn try_from(response: EpochResponse) -> Result<Self, Self::Error> {
        Ok(Epoch {
            hash: decode::<EpochHash>("epoch hash", &response.hash)?,
            block_number: response.block_number,
        })
    }
}

impl TryFrom<PodResponse> for Pod {
    type Error = Error;

    fn try_from(response: PodResponse) -> Result<Self, Self::Error> {
        let darknodes = response
            .darknodes
            .iter()
            .map(|darknode| decode::<Address>("darknode", darknode))
            .collect::<Result<_, _>>()?;
        Ok(Pod {
            hash: decode::<PodHash>("pod hash", &response.hash)?,
            darknodes,
        })
    }
}

/// Registry gateway client that sends transactions from `from`.
#[derive(Clone)]
pub struct Client {
    base: Arc<String>,
    from: Arc<String>,
    client: HttpClient,
}

impl Client {
    pub fn new(base: &str, from: &str, timeout: Duration) -> Result<Self, Error> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Registry(err.to_string()))?;
        Ok(Self {
            base: Arc::new(base.trim_end_matches('/').to_string()),
            from: Arc::new(from.to_string()),
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = format!("{}{}", self.base, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| Error::Registry(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Registry(format!("GET {path}: {status} {body}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| Error::Registry(err.to_string()))
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), Error> {
        let url = format!("{}{}", self.base, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| Error::Registry(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Registry(format!("POST {path}: {status} {body}")));
        }
        debug!(path, "registry transaction accepted");
        Ok(())
    }

    async fn order(
        &self,
        path: &str,
        signature: Signature,
        order_id: OrderId,
    ) -> Result<(), Error> {
        let body = OrderRequest {
            from: &self.from,
            signature: hex(signature.as_ref()),
            order_id: hex(order_id.as_ref()),
        };
        self.post(path, &body).await
    }

    async fn pods_at(&self, path: &str) -> Result<Vec<Pod>, Error> {
        let pods: Vec<PodResponse> = self.get(path).await?;
        pods.into_iter().map(Pod::try_from).collect()
    }
}

impl Registry for Client {
    async fn epoch(&self) -> Result<Epoch, Error> {
        self.get::<EpochResponse>("/epoch").await?.try_into()
    }

    async fn previous_epoch(&self) -> Result<Epoch, Error> {
        self.get::<EpochResponse>("/epoch/previous").await?.try_into()
    }

    async fn next_epoch(&self) -> Result<(), Error> {
        let body = TransactionRequest { from: &self.from };
        self.post("/epoch/next", &body).await
    }

    async fn minimum_epoch_interval(&self) -> Result<u64, Error> {
        Ok(self.get::<IntervalResponse>("/epoch/interval").await?.interval)
    }

    async fn pods(&self) -> Result<Vec<Pod>, Error> {
        self.pods_at("/pods").await
    }

    async fn previous_pods(&self) -> Result<Vec<Pod>, Error> {
        self.pods_at("/pods/previous").await
    }

    async fn open_buy_order(&self, signature: Signature, order_id: OrderId) -> Result<(), Error> {
        self.order("/orders/buy", signature, order_id).await
    }

    async fn open_sell_order(&self, signature: Signature, order_id: OrderId) -> Result<(), Error> {
        self.order("/orders/sell", signature, order_id).await
    }

    async fn cancel_order(&self, signature: Signature, order_id: OrderId) -> Result<(), Error> {
        self.order("/orders/cancel", signature, order_id).await
    }
}
