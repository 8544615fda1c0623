//! Incremental XML encoder.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::escape;
use shared_types::dates::format_date;
use shared_types::{ContentDescriptor, ProductId, SignatureVersion};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;

use super::PRODUCT_XML_NAMESPACE;
use crate::domain::errors::{ProductIoError, Result};
use crate::ports::outbound::{Completion, ContentBody, ProductSink};

/// Raw bytes encoded per write; a multiple of 3 so chunks need no padding.
const ENCODE_CHUNK: usize = 48 * 1024;

/// Writes a product document as events arrive.
///
/// A failed stream leaves the document unterminated; the closing tag is only
/// written for a complete stream.
pub struct XmlProductSink<W> {
    out: W,
    signature_version: SignatureVersion,
}

impl<W: AsyncWrite + Unpin + Send> XmlProductSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            signature_version: SignatureVersion::default(),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        Ok(())
    }

    async fn write_base64<R>(&mut self, path: &str, declared: u64, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut chunk = vec![0u8; ENCODE_CHUNK];
        let mut carry: Vec<u8> = Vec::with_capacity(ENCODE_CHUNK + 2);
        let mut actual = 0u64;
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            actual += n as u64;
            carry.extend_from_slice(&chunk[..n]);
            let complete = carry.len() / 3 * 3;
            let encoded = STANDARD.encode(&carry[..complete]);
            self.out.write_all(encoded.as_bytes()).await?;
            carry.drain(..complete);
        }
        if !carry.is_empty() {
            let encoded = STANDARD.encode(&carry);
            self.out.write_all(encoded.as_bytes()).await?;
        }
        if actual != declared {
            return Err(ProductIoError::ContentLengthMismatch {
                path: path.to_string(),
                declared,
                actual,
            });
        }
        Ok(())
    }
}

fn content_attributes(path: &str, descriptor: &ContentDescriptor) -> String {
    format!(
        "path=\"{}\" type=\"{}\" length=\"{}\" modified=\"{}\"",
        escape(path),
        escape(descriptor.content_type.as_str()),
        descriptor.length,
        format_date(&descriptor.last_modified)
    )
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> ProductSink for XmlProductSink<W> {
    async fn on_begin(
        &mut self,
        id: &ProductId,
        status: &str,
        tracker_url: Option<&Url>,
    ) -> Result<()> {
        let mut head = format!(
            "<?xml version=\"1.0\"?>\n<product xmlns=\"{}\" id=\"{}\" updateTime=\"{}\" status=\"{}\"",
            PRODUCT_XML_NAMESPACE,
            escape(id.to_string().as_str()),
            format_date(&id.update_time()),
            escape(status),
        );
        if let Some(tracker) = tracker_url {
            head.push_str(&format!(" trackerURL=\"{}\"", escape(tracker.as_str())));
        }
        head.push_str(">\n");
        self.write(&head).await
    }

    async fn on_property(&mut self, _id: &ProductId, name: &str, value: &str) -> Result<()> {
        let line = format!(
            "\t<property name=\"{}\" value=\"{}\"/>\n",
            escape(name),
            escape(value)
        );
        self.write(&line).await
    }

    async fn on_link(&mut self, _id: &ProductId, relation: &str, uri: &Url) -> Result<()> {
        let line = format!(
            "\t<link rel=\"{}\" href=\"{}\"/>\n",
            escape(relation),
            escape(uri.as_str())
        );
        self.write(&line).await
    }

    async fn on_content(
        &mut self,
        _id: &ProductId,
        path: &str,
        descriptor: ContentDescriptor,
        body: ContentBody,
    ) -> Result<()> {
        let attributes = content_attributes(path, &descriptor);
        match body {
            ContentBody::Url(url) => {
                let line = format!(
                    "\t<content {} href=\"{}\"/>\n",
                    attributes,
                    escape(url.as_str())
                );
                self.write(&line).await
            }
            ContentBody::Stream(mut reader) => {
                self.write(&format!("\t<content {attributes} encoded=\"true\">"))
                    .await?;
                self.write_base64(path, descriptor.length, &mut reader)
                    .await?;
                self.write("</content>\n").await
            }
        }
    }

    async fn on_signature_version(
        &mut self,
        _id: &ProductId,
        version: SignatureVersion,
    ) -> Result<()> {
        self.signature_version = version;
        Ok(())
    }

    async fn on_signature(&mut self, _id: &ProductId, signature: &str) -> Result<()> {
        let line = format!(
            "\t<signature version=\"{}\">{}</signature>\n",
            self.signature_version,
            escape(signature)
        );
        self.write(&line).await
    }

    async fn on_end(&mut self, _id: &ProductId, completion: Completion) -> Result<()> {
        if completion == Completion::Complete {
            self.write("</product>\n").await?;
        }
        self.out.flush().await?;
        Ok(())
    }
}
