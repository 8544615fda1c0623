//! # Product Encodings
//!
//! Streams are tagged by their first significant byte. Detection walks an
//! ordered sniff list after skipping an optional UTF-8 BOM and whitespace.

use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ProductIoError;

pub(crate) const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Serialized product representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductEncoding {
    /// Streaming XML document
    #[default]
    Xml,
    /// Buffered JSON document
    Json,
}

/// Ordered sniff list: first significant byte to encoding.
const SNIFF_ORDER: &[(u8, ProductEncoding)] =
    &[(b'<', ProductEncoding::Xml), (b'{', ProductEncoding::Json)];

/// Result of inspecting leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniff {
    /// A significant byte was found and matched.
    Known(ProductEncoding),
    /// A significant byte was found and matched nothing.
    Unknown,
    /// Only BOM and whitespace so far; more input is needed.
    NeedMore,
}

impl ProductEncoding {
    /// Encoding of a stream starting with `leading`.
    pub fn sniff(leading: &[u8]) -> Sniff {
        let body = leading.strip_prefix(UTF8_BOM).unwrap_or(leading);
        // a partial BOM cannot be judged yet
        if body.len() == leading.len() && !leading.is_empty() && UTF8_BOM.starts_with(leading) {
            return Sniff::NeedMore;
        }
        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            None => Sniff::NeedMore,
            Some(first) => SNIFF_ORDER
                .iter()
                .find(|(marker, _)| marker == first)
                .map(|(_, encoding)| Sniff::Known(*encoding))
                .unwrap_or(Sniff::Unknown),
        }
    }

    /// Lowercase name, as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductEncoding::Xml => "xml",
            ProductEncoding::Json => "json",
        }
    }
}

impl fmt::Display for ProductEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductEncoding {
    type Err = ProductIoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(ProductEncoding::Xml),
            "json" => Ok(ProductEncoding::Json),
            _ => Err(ProductIoError::UnknownEncoding),
        }
    }
}
