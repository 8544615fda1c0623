//! # Streaming XML Encoding
//!
//! ```xml
//! <?xml version="1.0"?>
//! <product xmlns="http://earthquake.usgs.gov/distribution/product"
//!          id="urn:usgs-product:us:origin:abc:1700000000123"
//!          updateTime="2023-11-14T22:13:20.123Z" status="UPDATE">
//!     <property name="magnitude" value="4.5"/>
//!     <link rel="related" href="http://example.com/a"/>
//!     <content path="remote.txt" type="text/plain" length="42" modified="…" href="…"/>
//!     <content path="" type="text/plain" length="7" modified="…" encoded="true">cHJpbWFyeQ==</content>
//!     <signature version="v2">…</signature>
//! </product>
//! ```
//!
//! Both directions are incremental: the encoder writes base64 as it reads
//! content bytes, and the decoder hands embedded content to the sink through
//! a bounded pipe while it is still being parsed.

mod sink;
mod source;
mod text;

pub use sink::XmlProductSink;
pub use source::XmlProductSource;

/// Namespace of the product document.
pub const PRODUCT_XML_NAMESPACE: &str = "http://earthquake.usgs.gov/distribution/product";

const PRODUCT_ELEMENT: &[u8] = b"product";
const PROPERTY_ELEMENT: &[u8] = b"property";
const LINK_ELEMENT: &[u8] = b"link";
const CONTENT_ELEMENT: &[u8] = b"content";
const SIGNATURE_ELEMENT: &[u8] = b"signature";
