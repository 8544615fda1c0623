//! # Core Domain Entities
//!
//! Defines the product identity and the product entity.
//!
//! ## Identity
//!
//! A `ProductId` is the 4-tuple `(source, type, code, updateTime)`. Two
//! products with equal ids are the same logical revision. Its string form is
//! `urn:usgs-product:<source>:<type>:<code>:<updateTimeMillis>`.
//!
//! ## Product
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `status` | `UPDATE` or `DELETE` (other strings carried verbatim) |
//! | `tracker_url` | Optional reporting endpoint |
//! | `properties` | Unique name to value |
//! | `links` | Relation to ordered URIs, duplicates allowed |
//! | `contents` | Path to content; `""` is the primary content |
//! | `signature` | Base64 signature over the product digest |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use url::Url;

use crate::content::Content;
use crate::dates::{from_millis, truncate_to_millis};
use crate::errors::ProductError;

/// Prefix of the product id URN.
pub const PRODUCT_ID_URN_PREFIX: &str = "urn:usgs-product:";

/// Status of a regular product revision.
pub const STATUS_UPDATE: &str = "UPDATE";

/// Status of a tombstone revision.
pub const STATUS_DELETE: &str = "DELETE";

// =============================================================================
// PRODUCT ID
// =============================================================================

/// Identity of one product revision.
///
/// Ordering and equality cover all four fields. The update time is kept at
/// millisecond resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductId {
    source: String,
    product_type: String,
    code: String,
    update_time: DateTime<Utc>,
}

impl ProductId {
    /// Create a product id; sub-millisecond precision is dropped.
    pub fn new(
        source: impl Into<String>,
        product_type: impl Into<String>,
        code: impl Into<String>,
        update_time: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            product_type: product_type.into(),
            code: code.into(),
            update_time: truncate_to_millis(update_time),
        }
    }

    /// Network or organization that produced the product.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Kind of product.
    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    /// Source-assigned code, unique within source and type.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Revision time.
    pub fn update_time(&self) -> DateTime<Utc> {
        self.update_time
    }

    /// Same identity with a different revision time.
    pub fn with_update_time(&self, update_time: DateTime<Utc>) -> Self {
        Self::new(
            self.source.clone(),
            self.product_type.clone(),
            self.code.clone(),
            update_time,
        )
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}:{}:{}",
            PRODUCT_ID_URN_PREFIX,
            self.source,
            self.product_type,
            self.code,
            self.update_time.timestamp_millis()
        )
    }
}

impl FromStr for ProductId {
    type Err = ProductError;

    /// Parse the URN form. Source and type are split off the left and the
    /// time off the right; whatever remains is the code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| ProductError::MalformedId {
            id: s.to_string(),
            reason,
        };

        let rest = s
            .trim()
            .strip_prefix(PRODUCT_ID_URN_PREFIX)
            .ok_or_else(|| malformed("missing urn:usgs-product: prefix"))?;
        let (head, millis) = rest
            .rsplit_once(':')
            .ok_or_else(|| malformed("missing update time"))?;

        let mut parts = head.splitn(3, ':');
        let source = parts.next().unwrap_or_default();
        let product_type = parts.next().unwrap_or_default();
        let code = parts.next().unwrap_or_default();
        if source.is_empty() || product_type.is_empty() || code.is_empty() {
            return Err(malformed("expected source, type and code"));
        }

        let millis: i64 = millis
            .parse()
            .map_err(|_| malformed("update time is not epoch milliseconds"))?;
        let update_time = from_millis(millis)?;

        Ok(Self::new(source, product_type, code, update_time))
    }
}

// =============================================================================
// SIGNATURE VERSION
// =============================================================================

/// Which algorithm family a signature was made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureVersion {
    /// SHA-1 based (DSA or RSA PKCS#1 v1.5).
    #[default]
    V1,
    /// SHA-256 based (DSA or RSA-PSS).
    V2,
}

impl SignatureVersion {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureVersion::V1 => "v1",
            SignatureVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for SignatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureVersion {
    type Err = ProductError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "v1" => Ok(SignatureVersion::V1),
            "v2" => Ok(SignatureVersion::V2),
            other => Err(ProductError::InvalidSignatureVersion(other.to_string())),
        }
    }
}

// =============================================================================
// PRODUCT
// =============================================================================

/// One versioned unit of distributed data.
///
/// Immutable once handed to the signing or transport pipeline, except for
/// signature assignment.
#[derive(Debug, Clone)]
pub struct Product {
    /// Identity of this revision.
    pub id: ProductId,
    /// `UPDATE` or `DELETE`.
    pub status: String,
    /// Optional reporting endpoint.
    pub tracker_url: Option<Url>,
    /// Name to value, keys unique.
    pub properties: BTreeMap<String, String>,
    /// Relation to ordered URIs.
    pub links: BTreeMap<String, Vec<Url>>,
    /// Path to content.
    pub contents: BTreeMap<String, Content>,
    /// Base64 signature, if signed.
    pub signature: Option<String>,
    /// Algorithm family of `signature`.
    pub signature_version: SignatureVersion,
}

impl Product {
    /// An empty `UPDATE` product.
    pub fn new(id: ProductId) -> Self {
        Self {
            id,
            status: STATUS_UPDATE.to_string(),
            tracker_url: None,
            properties: BTreeMap::new(),
            links: BTreeMap::new(),
            contents: BTreeMap::new(),
            signature: None,
            signature_version: SignatureVersion::default(),
        }
    }

    /// Whether downstream consumers should treat this revision as a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_DELETE)
    }

    /// Append a link, keeping any existing links for the relation.
    pub fn add_link(&mut self, relation: impl Into<String>, uri: Url) {
        self.links.entry(relation.into()).or_default().push(uri);
    }

    /// `latitude` property as a decimal.
    pub fn latitude(&self) -> Option<f64> {
        self.decimal_property("latitude")
    }

    /// `longitude` property as a decimal.
    pub fn longitude(&self) -> Option<f64> {
        self.decimal_property("longitude")
    }

    /// `depth` property as a decimal.
    pub fn depth(&self) -> Option<f64> {
        self.decimal_property("depth")
    }

    fn decimal_property(&self, name: &str) -> Option<f64> {
        self.properties
            .get(name)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }
}
