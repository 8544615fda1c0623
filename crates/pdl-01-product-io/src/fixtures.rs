//! Products shared by the unit tests.

use shared_types::dates::from_millis;
use shared_types::{Content, ContentDescriptor, Product, ProductId, SignatureVersion};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::domain::errors::Result;
use crate::ports::outbound::{Completion, ContentBody, ProductSink};

/// A product exercising every field: properties, repeated links, primary,
/// embedded and reference contents, and a signature.
pub(crate) fn sample_product() -> Product {
    let id = ProductId::new(
        "us",
        "origin",
        "abc123",
        from_millis(1_700_000_000_123).unwrap(),
    );
    let mut product = Product::new(id);
    product.tracker_url = Some(Url::parse("http://tracker.example/track").unwrap());
    product.properties.insert("magnitude".into(), "4.5".into());
    product.properties.insert("eventsource".into(), "us".into());
    product.properties.insert("latitude".into(), "34.5".into());
    product.properties.insert("longitude".into(), "-118.25".into());
    product.properties.insert("note".into(), "a < b & \"c\"".into());
    product.add_link("related", Url::parse("http://example.com/a").unwrap());
    product.add_link("related", Url::parse("http://example.com/b").unwrap());
    product
        .contents
        .insert("".into(), Content::from_bytes("text/plain", &b"primary <&> bytes"[..]));
    product.contents.insert(
        "data/map.png".into(),
        Content::from_bytes("image/png", vec![0u8, 1, 2, 3, 255]),
    );
    product.contents.insert(
        "remote.txt".into(),
        Content::from_url(
            ContentDescriptor::new("text/plain", 42, from_millis(1_000).unwrap()),
            Url::parse("http://example.com/remote.txt").unwrap(),
        ),
    );
    product.signature_version = SignatureVersion::V2;
    product.signature = Some("c2lnbmF0dXJl".into());
    product
}

/// Sink recording every event as a line of text.
///
/// With `drop_content` set, streamed contents are dropped unread.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub events: Vec<String>,
    pub drop_content: bool,
}

#[async_trait::async_trait]
impl ProductSink for RecordingSink {
    async fn on_begin(&mut self, id: &ProductId, status: &str, tracker_url: Option<&Url>) -> Result<()> {
        self.events.push(format!(
            "begin {id} {status} {}",
            tracker_url.map(Url::as_str).unwrap_or("-")
        ));
        Ok(())
    }

    async fn on_property(&mut self, _id: &ProductId, name: &str, value: &str) -> Result<()> {
        self.events.push(format!("property {name}={value}"));
        Ok(())
    }

    async fn on_link(&mut self, _id: &ProductId, relation: &str, uri: &Url) -> Result<()> {
        self.events.push(format!("link {relation} {uri}"));
        Ok(())
    }

    async fn on_content(
        &mut self,
        _id: &ProductId,
        path: &str,
        descriptor: ContentDescriptor,
        body: ContentBody,
    ) -> Result<()> {
        match body {
            ContentBody::Url(url) => {
                self.events
                    .push(format!("content {path} {} url {url}", descriptor.length));
            }
            ContentBody::Stream(_) if self.drop_content => {
                self.events
                    .push(format!("content {path} {} dropped", descriptor.length));
            }
            ContentBody::Stream(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes).await?;
                self.events.push(format!(
                    "content {path} {} {}",
                    descriptor.length,
                    String::from_utf8_lossy(&bytes)
                ));
            }
        }
        Ok(())
    }

    async fn on_signature_version(&mut self, _id: &ProductId, version: SignatureVersion) -> Result<()> {
        self.events.push(format!("signature-version {version}"));
        Ok(())
    }

    async fn on_signature(&mut self, _id: &ProductId, signature: &str) -> Result<()> {
        self.events.push(format!("signature {signature}"));
        Ok(())
    }

    async fn on_end(&mut self, _id: &ProductId, completion: Completion) -> Result<()> {
        self.events.push(format!("end {completion:?}"));
        Ok(())
    }
}
