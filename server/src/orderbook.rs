//! [Orderbook] that delivers fragments to darknodes over HTTP.

use crate::wire::Fragment;
use darkpool_ingress::{EncryptedFragment, Error, MultiAddress, Orderbook};
use reqwest::Client as HttpClient;
use std::time::Duration;

/// Extract `host:port` from a `/ip4/<host>/tcp/<port>/...` multiaddress.
fn endpoint(address: &MultiAddress) -> Result<String, Error> {
    let mut parts = address.0.split('/').skip(1);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("ip4" | "dns4" | "dns"), Some(host), Some("tcp"), Some(port)) => {
            Ok(format!("{host}:{port}"))
        }
        (Some("ip6"), Some(host), Some("tcp"), Some(port)) => Ok(format!("[{host}]:{port}")),
        _ => Err(Error::Delivery(format!("unsupported address: {address}"))),
    }
}

#[derive(Clone)]
pub struct Client {
    client: HttpClient,
}

impl Client {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Delivery(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Orderbook for Client {
    async fn open_order(
        &self,
        address: MultiAddress,
        fragment: EncryptedFragment,
    ) -> Result<(), Error> {
        let url = format!("http://{}/orderbook/fragments", endpoint(&address)?);
        let response = self
            .client
            .post(&url)
            .json(&Fragment::from(&fragment))
            .send()
            .await
            .map_err(|err| Error::Delivery(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!("{url}: {status} {body}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let address = MultiAddress("/ip4/10.0.0.1/tcp/18514/republic/0x01".into());
        assert_eq!(endpoint(&address).unwrap(), "10.0.0.1:18514");

        let address = MultiAddress("/ip6/::1/tcp/18514".into());
        assert_eq!(endpoint(&address).unwrap(), "[::1]:18514");

        let address = MultiAddress("/ip4/10.0.0.1/udp/18514".into());
        assert!(matches!(endpoint(&address), Err(Error::Delivery(_))));
        assert!(endpoint(&MultiAddress(String::new())).is_err());
    }
}
