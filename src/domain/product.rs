//! Product identifiers and details.

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::domain::error::InvalidProductId;

/// Upper bound on identifier length accepted from callers and upstream.
pub const MAX_ID_LEN: usize = 256;

/// Opaque, non-empty product identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Parse a caller-supplied identifier.
    ///
    /// Surrounding whitespace is trimmed; an empty result is rejected.
    pub fn parse(raw: &str) -> Result<Self, InvalidProductId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidProductId::Empty);
        }
        if trimmed.len() > MAX_ID_LEN {
            return Err(InvalidProductId::TooLong(trimmed.len()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build an id from a JSON value as the upstream emits them.
    ///
    /// The catalog returns ids either as strings or as integers.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, InvalidProductId> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) => Self::parse(&n.to_string()),
            _ => Err(InvalidProductId::NotScalar),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        ProductId::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Related identifiers for a root product. Ordered for stable logs.
pub type RelatedIdSet = BTreeSet<ProductId>;

/// Immutable product detail as served by the catalog.
///
/// Two details with the same `id` are the same product: equality and
/// hashing ignore the other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "bigdecimal::serde::json_num")]
    pub price: BigDecimal,
    pub availability: bool,
}

impl ProductDetail {
    pub fn new(id: ProductId, name: impl Into<String>, price: BigDecimal, availability: bool) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            availability,
        }
    }

    /// Check payload invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.price < BigDecimal::zero() {
            return Err(format!("negative price {} for product {}", self.price, self.id));
        }
        Ok(())
    }
}

impl PartialEq for ProductDetail {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProductDetail {}

impl Hash for ProductDetail {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
