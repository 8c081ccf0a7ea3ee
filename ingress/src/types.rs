//! Domain types shared by every stage of the ingress.

use bytes::Bytes;
use commonware_utils::hex;
use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Display},
};

/// Declare a fixed-width byte identifier.
macro_rules! fixed {
    ($(#[$doc:meta])* $name:ident, $size:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $size]);

        impl $name {
            /// Width of the identifier in bytes.
            pub const SIZE: usize = $size;

            pub const fn new(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0; $size])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $size]> for $name {
            fn from(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = usize;

            /// Fails with the length of the rejected slice.
            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                let bytes: [u8; $size] = bytes.try_into().map_err(|_| bytes.len())?;
                Ok(Self(bytes))
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex(&self.0))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex(&self.0))
            }
        }
    };
}

fixed!(
    /// Identifier of an order, shared by all of its fragments.
    OrderId,
    32
);
fixed!(
    /// Identifier of a single encrypted fragment.
    FragmentId,
    32
);
fixed!(
    /// Identifier of a pod.
    PodHash,
    32
);
fixed!(
    /// Identifier of an epoch, as reported by the registry.
    EpochHash,
    32
);
fixed!(
    /// Address of a darknode.
    Address,
    20
);
fixed!(
    /// Recoverable signature submitted by the trader.
    Signature,
    65
);

/// Network address at which a darknode can be reached.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MultiAddress(pub String);

impl Display for MultiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side of the book an order sits on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Parity {
    #[default]
    Buy = 0,
    Sell = 1,
}

impl TryFrom<i64> for Parity {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Parity::Buy),
            1 => Ok(Parity::Sell),
            other => Err(other),
        }
    }
}

/// Encrypted coefficient/exponent pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoExp {
    pub co: Bytes,
    pub exp: Bytes,
}

/// A fragment of an order, encrypted for exactly one darknode.
///
/// The ingress never decrypts fragments: only the routing fields
/// (`order_id`, `index`, `epoch_depth`) are inspected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncryptedFragment {
    pub order_id: OrderId,
    pub order_type: u32,
    pub order_parity: Parity,
    pub order_settlement: u32,
    /// Unix seconds.
    pub order_expiry: i64,
    pub id: FragmentId,
    /// 1-based position within the pod.
    pub index: u64,
    pub epoch_depth: u32,
    pub tokens: Bytes,
    pub price: CoExp,
    pub volume: CoExp,
    pub minimum_volume: CoExp,
    pub nonce: Bytes,
}

/// A committee of darknodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pod {
    pub hash: PodHash,
    pub darknodes: Vec<Address>,
}

impl Pod {
    /// Minimum number of darknodes that must receive their fragment.
    ///
    /// Zero for an empty pod, otherwise `ceil(2(n+1)/3)`.
    pub fn threshold(&self) -> usize {
        let n = self.darknodes.len();
        if n == 0 {
            return 0;
        }
        (2 * (n + 1)).div_ceil(3)
    }

    /// Whether `delivered` successful deliveries reach the threshold.
    ///
    /// An empty pod never reaches quorum.
    pub fn quorum(&self, delivered: usize) -> bool {
        !self.darknodes.is_empty() && delivered >= self.threshold()
    }
}

/// An epoch as reported by the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Epoch {
    pub hash: EpochHash,
    pub block_number: u64,
}

/// Pods of one epoch, keyed by hash.
pub type Pods = BTreeMap<PodHash, Pod>;

/// Fragments addressed to each pod of one epoch.
pub type OrderFragmentMapping = BTreeMap<PodHash, Vec<EncryptedFragment>>;

/// One mapping per epoch depth, the position in the list being the depth.
pub type OrderFragmentMappings = Vec<OrderFragmentMapping>;

/// Collect a list of pods into [Pods].
pub fn index(pods: Vec<Pod>) -> Pods {
    pods.into_iter().map(|pod| (pod.hash, pod)).collect()
}
