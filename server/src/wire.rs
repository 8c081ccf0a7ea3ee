//! JSON encoding of submissions, with binary fields in base64.

use crate::error::Error;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use darkpool_ingress::{
    CoExp, EncryptedFragment, FragmentId, OrderFragmentMapping, OrderFragmentMappings, OrderId,
    Parity, PodHash, Signature,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /orders`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderRequest {
    pub signature: String,
    /// Pod hash (base64) to fragments, one map per epoch depth.
    pub order_fragment_mappings: Vec<BTreeMap<String, Vec<Fragment>>>,
}

/// Query of `DELETE /orders`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub id: String,
    pub signature: String,
}

/// An [EncryptedFragment] as it travels over HTTP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub order_id: String,
    pub order_type: i64,
    pub order_parity: i64,
    pub order_settlement: i64,
    pub order_expiry: i64,
    pub index: i64,
    pub id: String,
    pub epoch_depth: i64,
    pub tokens: String,
    pub price: [String; 2],
    pub volume: [String; 2],
    pub minimum_volume: [String; 2],
    pub nonce: String,
}

impl Fragment {
    pub fn decode(self) -> Result<EncryptedFragment, Error> {
        let order_parity = Parity::try_from(self.order_parity).map_err(|value| Error::Value {
            field: "orderParity",
            value,
        })?;
        Ok(EncryptedFragment {
            order_id: fixed("orderId", &self.order_id, OrderId::SIZE)?,
            order_type: number("orderType", self.order_type)?,
            order_parity,
            order_settlement: number("orderSettlement", self.order_settlement)?,
            order_expiry: self.order_expiry,
            id: fixed::<FragmentId>("id", &self.id, FragmentId::SIZE)?,
            index: number("index", self.index)?,
            epoch_depth: number("epochDepth", self.epoch_depth)?,
            tokens: blob("tokens", &self.tokens)?,
            price: co_exp("price", &self.price)?,
            volume: co_exp("volume", &self.volume)?,
            minimum_volume: co_exp("minimumVolume", &self.minimum_volume)?,
            nonce: blob("nonce", &self.nonce)?,
        })
    }
}

impl From<&EncryptedFragment> for Fragment {
    fn from(fragment: &EncryptedFragment) -> Self {
        let pair = |share: &CoExp| [STANDARD.encode(&share.co), STANDARD.encode(&share.exp)];
        Self {
            order_id: STANDARD.encode(fragment.order_id),
            order_type: fragment.order_type.into(),
            order_parity: fragment.order_parity as i64,
            order_settlement: fragment.order_settlement.into(),
            order_expiry: fragment.order_expiry,
            // Indices beyond i64 cannot be addressed by any pod
            index: i64::try_from(fragment.index).unwrap_or(i64::MAX),
            id: STANDARD.encode(fragment.id),
            epoch_depth: fragment.epoch_depth.into(),
            tokens: STANDARD.encode(&fragment.tokens),
            price: pair(&fragment.price),
            volume: pair(&fragment.volume),
            minimum_volume: pair(&fragment.minimum_volume),
            nonce: STANDARD.encode(&fragment.nonce),
        }
    }
}

impl OpenOrderRequest {
    /// Build a request for `mappings`.
    pub fn new(signature: &Signature, mappings: &[OrderFragmentMapping]) -> Self {
        let order_fragment_mappings = mappings
            .iter()
            .map(|mapping| {
                mapping
                    .iter()
                    .map(|(pod, fragments)| {
                        let fragments = fragments.iter().map(Fragment::from).collect();
                        (STANDARD.encode(pod), fragments)
                    })
                    .collect()
            })
            .collect();
        Self {
            signature: STANDARD.encode(signature),
            order_fragment_mappings,
        }
    }

    /// Decode into the signature, the order id shared by the fragments, and
    /// the mappings.
    ///
    /// The order id is taken from the first fragment of the first non-empty
    /// mapping. A request without any fragment decodes with a zero order id
    /// and is left for validation to reject.
    pub fn decode(self) -> Result<(Signature, OrderId, OrderFragmentMappings), Error> {
        let signature = fixed("signature", &self.signature, Signature::SIZE)?;
        let mut mappings = Vec::with_capacity(self.order_fragment_mappings.len());
        for encoded in self.order_fragment_mappings {
            let mut mapping = OrderFragmentMapping::new();
            for (pod, fragments) in encoded {
                let pod: PodHash = fixed("podHash", &pod, PodHash::SIZE)?;
                let fragments = fragments
                    .into_iter()
                    .map(Fragment::decode)
                    .collect::<Result<Vec<_>, _>>()?;
                mapping.insert(pod, fragments);
            }
            mappings.push(mapping);
        }
        let order_id = mappings
            .iter()
            .flat_map(|mapping| mapping.values())
            .flatten()
            .map(|fragment| fragment.order_id)
            .next()
            .unwrap_or_default();
        Ok((signature, order_id, mappings))
    }
}

impl CancelOrderRequest {
    pub fn decode(self) -> Result<(Signature, OrderId), Error> {
        let signature = fixed("signature", &self.signature, Signature::SIZE)?;
        let order_id = fixed("id", &self.id, OrderId::SIZE)?;
        Ok((signature, order_id))
    }
}

fn blob(field: &'static str, value: &str) -> Result<Bytes, Error> {
    STANDARD
        .decode(value)
        .map(Bytes::from)
        .map_err(|_| Error::Base64(field))
}

fn fixed<T>(field: &'static str, value: &str, expected: usize) -> Result<T, Error>
where
    T: for<'a> TryFrom<&'a [u8], Error = usize>,
{
    let raw = STANDARD.decode(value).map_err(|_| Error::Base64(field))?;
    T::try_from(raw.as_slice()).map_err(|actual| Error::Length {
        field,
        expected,
        actual,
    })
}

fn number<T: TryFrom<i64>>(field: &'static str, value: i64) -> Result<T, Error> {
    T::try_from(value).map_err(|_| Error::Value { field, value })
}

fn co_exp(field: &'static str, [co, exp]: &[String; 2]) -> Result<CoExp, Error> {
    Ok(CoExp {
        co: blob(field, co)?,
        exp: blob(field, exp)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkpool_ingress::mocks;

    const ORDER: OrderId = OrderId::new([4; 32]);

    #[test]
    fn test_fragment_json() {
        let mut fragment = mocks::fragment(ORDER, 3, 1);
        fragment.order_parity = Parity::Sell;
        let encoded = serde_json::to_string(&Fragment::from(&fragment)).unwrap();
        assert!(encoded.contains("\"orderId\""));
        assert!(encoded.contains("\"minimumVolume\""));
        assert!(encoded.contains("\"epochDepth\":1"));
        assert!(encoded.contains("\"orderParity\":1"));

        let decoded: Fragment = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.decode().unwrap(), fragment);
    }

    #[test]
    fn test_request() {
        let pod = mocks::pod(1, 6);
        let signature = Signature::new([7; 65]);
        let mappings = vec![
            mocks::mapping(ORDER, &pod, 6, 0),
            mocks::mapping(ORDER, &mocks::pod(2, 6), 5, 1),
        ];
        let body = serde_json::to_vec(&OpenOrderRequest::new(&signature, &mappings)).unwrap();

        let request: OpenOrderRequest = serde_json::from_slice(&body).unwrap();
        let (decoded_signature, order_id, decoded) = request.decode().unwrap();
        assert_eq!(decoded_signature, signature);
        assert_eq!(order_id, ORDER);
        assert_eq!(decoded, mappings);
    }

    #[test]
    fn test_empty_mappings() {
        let request = OpenOrderRequest::new(&Signature::default(), &[]);
        let (_, order_id, mappings) = request.decode().unwrap();
        assert_eq!(order_id, OrderId::default());
        assert!(mappings.is_empty());
    }

    #[test]
    fn test_pod_without_fragments() {
        let pod = PodHash::new([3; 32]);
        let body = format!(
            r#"{{"signature": "{}", "orderFragmentMappings": [{{"{}": []}}]}}"#,
            STANDARD.encode([0u8; 65]),
            STANDARD.encode(pod)
        );
        let request: OpenOrderRequest = serde_json::from_str(&body).unwrap();
        let (_, order_id, mappings) = request.decode().unwrap();
        assert_eq!(order_id, OrderId::default());
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].get(&pod), Some(&Vec::new()));
    }

    #[test]
    fn test_pod_hash_length() {
        let pod = mocks::pod(1, 6);
        let mut request =
            OpenOrderRequest::new(&Signature::default(), &[mocks::mapping(ORDER, &pod, 6, 0)]);
        let (_, fragments) = request.order_fragment_mappings[0].pop_first().unwrap();
        request.order_fragment_mappings[0].insert(STANDARD.encode([1u8; 31]), fragments);
        assert!(matches!(
            request.decode(),
            Err(Error::Length {
                field: "podHash",
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn test_signature_length() {
        let mut request = OpenOrderRequest::new(&Signature::default(), &[]);
        request.signature = STANDARD.encode([0u8; 64]);
        assert!(matches!(
            request.decode(),
            Err(Error::Length {
                field: "signature",
                expected: 65,
                actual: 64
            })
        ));

        let cancel = CancelOrderRequest {
            id: STANDARD.encode(ORDER),
            signature: STANDARD.encode([0u8; 66]),
        };
        assert!(matches!(cancel.decode(), Err(Error::Length { actual: 66, .. })));
    }

    #[test]
    fn test_invalid_fields() {
        let mut fragment = Fragment::from(&mocks::fragment(ORDER, 1, 0));
        fragment.order_parity = 2;
        assert!(matches!(
            fragment.clone().decode(),
            Err(Error::Value {
                field: "orderParity",
                value: 2
            })
        ));

        fragment.order_parity = 0;
        fragment.index = -1;
        assert!(matches!(
            fragment.clone().decode(),
            Err(Error::Value { field: "index", .. })
        ));

        fragment.index = 1;
        fragment.nonce = "not base64!".into();
        assert!(matches!(fragment.decode(), Err(Error::Base64("nonce"))));
    }

    #[test]
    fn test_malformed_json() {
        let result = serde_json::from_slice::<OpenOrderRequest>(b"{\"signature\":");
        let err: Error = result.unwrap_err().into();
        assert!(err.is_invalid_request());
    }
}
