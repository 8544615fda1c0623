//! # Buffered JSON Document Encoding
//!
//! One JSON object per product. Keys are written in sorted order:
//!
//! | Key | Value |
//! |-----|-------|
//! | `contents` | `[{length, modified, path, sha256, type, url}]` |
//! | `geometry` | `{"type": "Point", "coordinates": [lat, lon, depth]}` or `null` |
//! | `id` | `{code, source, type, updateTime}` |
//! | `links` | `[{relation, uri}]` |
//! | `properties` | `{name: value}` |
//! | `signature` | base64 or `null` |
//! | `signatureVersion` | `v1` or `v2` |
//! | `status` | product status |
//! | `type` | always `Feature` |
//!
//! Every content needs a URL. The primary content (path `""`) may carry its
//! bytes inline as a `data:` URI; any other content without a URL cannot be
//! represented. The document carries no tracker URL.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shared_types::dates::{format_date, parse_date};
use shared_types::{
    sha256_hex, Content, ContentDescriptor, ContentSource, Product, ProductId, SignatureVersion,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::adapters::object::{ObjectProductSink, ObjectProductSource};
use crate::domain::encoding::UTF8_BOM;
use crate::domain::errors::{ProductIoError, Result};
use crate::ports::inbound::ProductSource;
use crate::ports::outbound::{Completion, ContentBody, ProductSink};

const FEATURE_TYPE: &str = "Feature";
const POINT_TYPE: &str = "Point";
const DATA_SCHEME_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

// =============================================================================
// DOCUMENT MODEL
// =============================================================================

/// Serialized product document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    #[serde(default)]
    pub contents: Vec<ContentDocument>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    pub id: IdDocument,
    #[serde(default)]
    pub links: Vec<LinkDocument>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(rename = "signatureVersion", default = "default_signature_version")]
    pub signature_version: String,
    pub status: String,
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDocument {
    pub length: u64,
    pub modified: String,
    pub path: String,
    pub sha256: Option<String>,
    #[serde(rename = "type")]
    pub content_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [Option<f64>; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdDocument {
    pub code: String,
    pub source: String,
    #[serde(rename = "type")]
    pub product_type: String,
    #[serde(rename = "updateTime")]
    pub update_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDocument {
    pub relation: String,
    pub uri: String,
}

fn default_signature_version() -> String {
    SignatureVersion::default().to_string()
}

fn feature_type() -> String {
    FEATURE_TYPE.to_string()
}

impl ProductDocument {
    /// Document form of `product`. Reads the primary content's bytes when
    /// it has no URL.
    pub async fn from_product(product: &Product) -> Result<Self> {
        let mut contents = Vec::with_capacity(product.contents.len());
        for (path, content) in &product.contents {
            contents.push(ContentDocument::from_content(path, content).await?);
        }

        let geometry = match (product.latitude(), product.longitude(), product.depth()) {
            (None, None, None) => None,
            (latitude, longitude, depth) => Some(Geometry {
                kind: POINT_TYPE.to_string(),
                coordinates: [latitude, longitude, depth],
            }),
        };

        let links = product
            .links
            .iter()
            .flat_map(|(relation, uris)| {
                uris.iter().map(move |uri| LinkDocument {
                    relation: relation.clone(),
                    uri: uri.to_string(),
                })
            })
            .collect();

        Ok(Self {
            contents,
            geometry,
            id: IdDocument {
                code: product.id.code().to_string(),
                source: product.id.source().to_string(),
                product_type: product.id.product_type().to_string(),
                update_time: format_date(&product.id.update_time()),
            },
            links,
            properties: product.properties.clone(),
            signature: product.signature.clone(),
            signature_version: product.signature_version.to_string(),
            status: product.status.clone(),
            kind: FEATURE_TYPE.to_string(),
        })
    }

    /// Materialize the product. `data:` URIs become in-memory bytes.
    pub fn into_product(self) -> Result<Product> {
        let update_time = parse_date(&self.id.update_time).map_err(ProductIoError::malformed)?;
        let id = ProductId::new(
            self.id.source,
            self.id.product_type,
            self.id.code,
            update_time,
        );
        if id.source().is_empty() || id.product_type().is_empty() || id.code().is_empty() {
            return Err(ProductIoError::malformed("id needs source, type and code"));
        }

        let mut product = Product::new(id);
        product.status = self.status;
        product.properties = self.properties;
        product.signature = self.signature;
        product.signature_version = self
            .signature_version
            .parse()
            .map_err(ProductIoError::malformed)?;
        for link in self.links {
            let uri = Url::parse(&link.uri)
                .map_err(|e| ProductIoError::malformed(format!("invalid link uri: {e}")))?;
            product.add_link(link.relation, uri);
        }
        for content in self.contents {
            let (path, content) = content.into_content()?;
            product.contents.insert(path, content);
        }
        Ok(product)
    }
}

impl ContentDocument {
    async fn from_content(path: &str, content: &Content) -> Result<Self> {
        let descriptor = &content.descriptor;
        let (url, sha256) = match &content.source {
            ContentSource::Url(url) => (url.to_string(), descriptor.sha256.clone()),
            _ if path.is_empty() => {
                let bytes = content.read_all().await?;
                let sha256 = descriptor
                    .sha256
                    .clone()
                    .unwrap_or_else(|| sha256_hex(&bytes));
                let url = format!(
                    "{DATA_SCHEME_PREFIX}{}{BASE64_MARKER},{}",
                    descriptor.content_type,
                    STANDARD.encode(&bytes)
                );
                (url, Some(sha256))
            }
            _ => return Err(ProductIoError::MissingContentUrl(path.to_string())),
        };
        Ok(Self {
            length: descriptor.length,
            modified: format_date(&descriptor.last_modified),
            path: path.to_string(),
            sha256,
            content_type: descriptor.content_type.clone(),
            url,
        })
    }

    fn into_content(self) -> Result<(String, Content)> {
        let modified = parse_date(&self.modified).map_err(ProductIoError::malformed)?;
        let mut descriptor = ContentDescriptor::new(self.content_type, self.length, modified);
        descriptor.sha256 = self.sha256;

        let source = match self.url.strip_prefix(DATA_SCHEME_PREFIX) {
            Some(data) => ContentSource::Bytes(decode_data_uri(data)?),
            None => ContentSource::Url(
                Url::parse(&self.url)
                    .map_err(|e| ProductIoError::malformed(format!("invalid content url: {e}")))?,
            ),
        };
        Ok((self.path, Content { descriptor, source }))
    }
}

/// Payload of a `data:` URI (without the scheme).
fn decode_data_uri(data: &str) -> Result<Bytes> {
    let (header, payload) = data
        .split_once(',')
        .ok_or_else(|| ProductIoError::malformed("data URI without payload"))?;
    if header.ends_with(BASE64_MARKER) {
        STANDARD
            .decode(payload)
            .map(Bytes::from)
            .map_err(|e| ProductIoError::malformed(format!("invalid data URI: {e}")))
    } else {
        Ok(Bytes::copy_from_slice(payload.as_bytes()))
    }
}

// =============================================================================
// SOURCE
// =============================================================================

/// Reads a whole JSON document from `R` and replays it.
pub struct JsonProductSource<R> {
    input: R,
}

impl<R: AsyncRead + Unpin + Send> JsonProductSource<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> ProductSource for JsonProductSource<R> {
    async fn stream_to(&mut self, sink: &mut dyn ProductSink) -> Result<()> {
        let mut buffer = Vec::new();
        self.input.read_to_end(&mut buffer).await?;
        let body = buffer.strip_prefix(UTF8_BOM).unwrap_or(&buffer);
        let document: ProductDocument = serde_json::from_slice(body)?;
        let product = document.into_product()?;
        ObjectProductSource::new(&product).stream_to(sink).await
    }
}

// =============================================================================
// SINK
// =============================================================================

/// Buffers a product and writes its document when the stream completes.
pub struct JsonProductSink<W> {
    out: W,
    builder: ObjectProductSink,
}

impl<W: AsyncWrite + Unpin + Send> JsonProductSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            builder: ObjectProductSink::new(),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> ProductSink for JsonProductSink<W> {
    async fn on_begin(
        &mut self,
        id: &ProductId,
        status: &str,
        tracker_url: Option<&Url>,
    ) -> Result<()> {
        self.builder.on_begin(id, status, tracker_url).await
    }

    async fn on_property(&mut self, id: &ProductId, name: &str, value: &str) -> Result<()> {
        self.builder.on_property(id, name, value).await
    }

    async fn on_link(&mut self, id: &ProductId, relation: &str, uri: &Url) -> Result<()> {
        self.builder.on_link(id, relation, uri).await
    }

    async fn on_content(
        &mut self,
        id: &ProductId,
        path: &str,
        descriptor: ContentDescriptor,
        body: ContentBody,
    ) -> Result<()> {
        if matches!(body, ContentBody::Stream(_)) && !path.is_empty() {
            return Err(ProductIoError::MissingContentUrl(path.to_string()));
        }
        self.builder.on_content(id, path, descriptor, body).await
    }

    async fn on_signature_version(
        &mut self,
        id: &ProductId,
        version: SignatureVersion,
    ) -> Result<()> {
        self.builder.on_signature_version(id, version).await
    }

    async fn on_signature(&mut self, id: &ProductId, signature: &str) -> Result<()> {
        self.builder.on_signature(id, signature).await
    }

    async fn on_end(&mut self, id: &ProductId, completion: Completion) -> Result<()> {
        self.builder.on_end(id, completion).await?;
        let Some(product) = self.builder.take_product() else {
            return Ok(());
        };
        let document = ProductDocument::from_product(&product).await?;
        let json = serde_json::to_vec(&document)?;
        self.out.write_all(&json).await?;
        self.out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_product, RecordingSink};

    /// Sample product without its non-primary embedded content.
    fn json_product() -> Product {
        let mut product = sample_product();
        product.contents.remove("data/map.png");
        product
    }

    async fn encode(product: &Product) -> Result<Vec<u8>> {
        let mut sink = JsonProductSink::new(Vec::new());
        ObjectProductSource::new(product).stream_to(&mut sink).await?;
        Ok(sink.into_inner())
    }

    async fn decode(json: &[u8]) -> Result<Product> {
        let mut sink = ObjectProductSink::new();
        JsonProductSource::new(json).stream_to(&mut sink).await?;
        Ok(sink.take_product().unwrap())
    }

    #[tokio::test]
    async fn test_round_trip() {
        let product = json_product();
        let decoded = decode(&encode(&product).await.unwrap()).await.unwrap();

        assert_eq!(decoded.id, product.id);
        assert_eq!(decoded.status, product.status);
        assert_eq!(decoded.tracker_url, None);
        assert_eq!(decoded.properties, product.properties);
        assert_eq!(decoded.links, product.links);
        assert_eq!(decoded.signature, product.signature);
        assert_eq!(decoded.signature_version, product.signature_version);
        assert_eq!(
            &decoded.contents[""].read_all().await.unwrap()[..],
            b"primary <&> bytes"
        );
        assert_eq!(
            decoded.contents[""].descriptor.sha256,
            product.contents[""].descriptor.sha256
        );
        assert_eq!(
            decoded.contents["remote.txt"].url(),
            product.contents["remote.txt"].url()
        );
    }

    #[tokio::test]
    async fn test_document_layout() {
        let json = encode(&json_product()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["type"], "Feature");
        assert_eq!(value["id"]["updateTime"], "2023-11-14T22:13:20.123Z");
        assert_eq!(value["geometry"]["type"], "Point");
        assert_eq!(
            value["geometry"]["coordinates"],
            serde_json::json!([34.5, -118.25, null])
        );
        assert_eq!(value["links"][0]["relation"], "related");
        assert!(value["contents"][0]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:text/plain;base64,"));
        // reference content from XML never has a digest
        assert!(value["contents"][1]["sha256"].is_null());

        assert!(json.starts_with(b"{\"contents\":"));
        assert!(json.ends_with(b"\"type\":\"Feature\"}"));
    }

    #[tokio::test]
    async fn test_null_signature_and_geometry() {
        let mut product = json_product();
        product.signature = None;
        product.properties.clear();
        let json = encode(&product).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert!(value["signature"].is_null());
        assert!(value["geometry"].is_null());
        assert!(value.as_object().unwrap().contains_key("signature"));
    }

    #[tokio::test]
    async fn test_non_primary_bytes_need_url() {
        let result = encode(&sample_product()).await;
        assert!(matches!(
            result,
            Err(ProductIoError::MissingContentUrl(path)) if path == "data/map.png"
        ));
    }

    #[tokio::test]
    async fn test_missing_status_is_malformed() {
        let json = br#"{"id": {"code": "c", "source": "s", "type": "t", "updateTime": "2024-01-01T00:00:00Z"}}"#;
        let mut sink = RecordingSink::default();
        let result = JsonProductSource::new(&json[..]).stream_to(&mut sink).await;
        assert!(matches!(result, Err(ProductIoError::MalformedInput(_))));
        assert!(sink.events.is_empty());
    }

    #[tokio::test]
    async fn test_minimal_document_defaults() {
        let json = br#"{"id": {"code": "c", "source": "s", "type": "t", "updateTime": "2024-01-01T00:00:00Z"}, "status": "DELETE"}"#;
        let product = decode(json).await.unwrap();
        assert!(product.is_deleted());
        assert_eq!(product.signature_version, SignatureVersion::V1);
        assert!(product.contents.is_empty());
    }

    #[test]
    fn test_plain_data_uri() {
        assert_eq!(&decode_data_uri(",hello").unwrap()[..], b"hello");
        assert_eq!(&decode_data_uri("text/plain;base64,aGk=").unwrap()[..], b"hi");
        assert!(decode_data_uri("text/plain;base64").is_err());
    }
}
