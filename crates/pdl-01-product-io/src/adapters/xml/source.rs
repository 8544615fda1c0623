//! Incremental XML decoder.
//!
//! Structural markup goes through quick-xml. Embedded content character
//! data is read straight from the buffered input instead, decoded chunk by
//! chunk and pushed through a content pipe to the sink, so a content is
//! never held in memory as a whole. The delivery future (the sink's
//! `on_content`) and the pump are polled together and both finish before
//! the next element is parsed.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use shared_types::dates::parse_date;
use shared_types::{ContentDescriptor, ProductId, SignatureVersion};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use url::Url;

use super::text::TextDecoder;
use super::{CONTENT_ELEMENT, LINK_ELEMENT, PRODUCT_ELEMENT, PROPERTY_ELEMENT, SIGNATURE_ELEMENT};
use crate::domain::errors::{ProductIoError, Result};
use crate::pipe::{content_pipe, PipeWriter, CONTENT_PIPE_CAPACITY};
use crate::ports::inbound::ProductSource;
use crate::ports::outbound::{end_stream, ContentBody, ProductSink};

/// Input buffer size; also bounds the size of one decoded chunk.
const XML_READ_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Product,
    Property,
    Link,
    Content,
    Signature,
    Other,
}

impl Tag {
    fn of(local_name: &[u8]) -> Self {
        match local_name {
            PRODUCT_ELEMENT => Tag::Product,
            PROPERTY_ELEMENT => Tag::Property,
            LINK_ELEMENT => Tag::Link,
            CONTENT_ELEMENT => Tag::Content,
            SIGNATURE_ELEMENT => Tag::Signature,
            _ => Tag::Other,
        }
    }
}

type Attributes = HashMap<String, String>;

/// Owned view of one parse event.
enum Item {
    Open {
        tag: Tag,
        attributes: Attributes,
        empty: bool,
    },
    Close(Tag),
    Text(String),
    Eof,
    Skip,
}

struct Root {
    id: ProductId,
    status: String,
    tracker_url: Option<Url>,
    empty: bool,
}

/// Decodes one product document from `R`.
pub struct XmlProductSource<R> {
    reader: Reader<BufReader<R>>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> XmlProductSource<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(BufReader::with_capacity(XML_READ_BUFFER, input));
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    async fn next_item(&mut self) -> Result<Item> {
        self.buf.clear();
        let event = self
            .reader
            .read_event_into_async(&mut self.buf)
            .await
            .map_err(xml_error)?;
        Ok(match event {
            Event::Start(start) => open(&start, false)?,
            Event::Empty(start) => open(&start, true)?,
            Event::End(end) => Item::Close(Tag::of(end.local_name().as_ref())),
            Event::Text(text) => Item::Text(
                text.unescape()
                    .map_err(|e| ProductIoError::malformed(format!("invalid XML text: {e}")))?
                    .into_owned(),
            ),
            Event::CData(data) => Item::Text(String::from_utf8_lossy(&data).into_owned()),
            Event::Eof => Item::Eof,
            _ => Item::Skip,
        })
    }

    async fn read_root(&mut self) -> Result<Root> {
        loop {
            match self.next_item().await? {
                Item::Open {
                    tag: Tag::Product,
                    attributes,
                    empty,
                } => return parse_root(attributes, empty),
                Item::Open { .. } => {
                    return Err(ProductIoError::malformed("expected a product element"))
                }
                Item::Eof => return Err(ProductIoError::malformed("no product element")),
                _ => continue,
            }
        }
    }

    async fn stream_body(&mut self, sink: &mut dyn ProductSink, id: &ProductId) -> Result<()> {
        let mut signature: Option<String> = None;
        loop {
            match self.next_item().await? {
                Item::Open {
                    tag: Tag::Property,
                    attributes,
                    ..
                } => {
                    let name = required(&attributes, "property", "name")?;
                    let value = attributes.get("value").map(String::as_str).unwrap_or("");
                    sink.on_property(id, name, value).await?;
                }
                Item::Open {
                    tag: Tag::Link,
                    attributes,
                    ..
                } => {
                    let relation = required(&attributes, "link", "rel")?;
                    let href = required(&attributes, "link", "href")?;
                    match Url::parse(href) {
                        Ok(uri) => sink.on_link(id, relation, &uri).await?,
                        Err(error) => {
                            tracing::debug!(product_id = %id, href, %error, "skipping unparsable link")
                        }
                    }
                }
                Item::Open {
                    tag: Tag::Content,
                    attributes,
                    empty,
                } => self.read_content(&mut *sink, id, attributes, empty).await?,
                Item::Open {
                    tag: Tag::Signature,
                    attributes,
                    empty,
                } => {
                    let version = match attributes.get("version") {
                        Some(version) => version
                            .parse::<SignatureVersion>()
                            .map_err(ProductIoError::malformed)?,
                        None => SignatureVersion::default(),
                    };
                    sink.on_signature_version(id, version).await?;
                    if !empty {
                        signature = Some(String::new());
                    }
                }
                Item::Text(text) => {
                    if let Some(signature) = signature.as_mut() {
                        signature.push_str(&text);
                    }
                }
                Item::Close(Tag::Signature) => {
                    if let Some(signature) = signature.take() {
                        let signature = signature.trim();
                        if !signature.is_empty() {
                            sink.on_signature(id, signature).await?;
                        }
                    }
                }
                Item::Close(Tag::Product) => return Ok(()),
                Item::Eof => {
                    return Err(ProductIoError::malformed("document ended inside product"))
                }
                _ => {}
            }
        }
    }

    async fn read_content(
        &mut self,
        sink: &mut dyn ProductSink,
        id: &ProductId,
        attributes: Attributes,
        empty: bool,
    ) -> Result<()> {
        let path = attributes.get("path").cloned().unwrap_or_default();
        let content_type = attributes.get("type").cloned().unwrap_or_default();
        let length: u64 = required(&attributes, "content", "length")?
            .trim()
            .parse()
            .map_err(|_| ProductIoError::malformed("content length is not a number"))?;
        let modified = parse_date(required(&attributes, "content", "modified")?)
            .map_err(ProductIoError::malformed)?;
        let descriptor = ContentDescriptor::new(content_type, length, modified);

        if let Some(href) = attributes.get("href") {
            let url = Url::parse(href)
                .map_err(|e| ProductIoError::malformed(format!("invalid content href: {e}")))?;
            sink.on_content(id, &path, descriptor, ContentBody::Url(url))
                .await?;
            if !empty {
                self.skip_to_end(Tag::Content).await?;
            }
            return Ok(());
        }

        let encoded = attributes.get("encoded").is_some_and(|v| v == "true");
        let (writer, reader) = content_pipe(CONTENT_PIPE_CAPACITY);
        let (delivered, pumped) = tokio::join!(
            sink.on_content(id, &path, descriptor, ContentBody::Stream(Box::pin(reader))),
            self.pump_content(writer, &path, length, encoded, empty),
        );
        // the pump's error is the cause of whatever the sink saw
        pumped?;
        delivered
    }

    async fn pump_content(
        &mut self,
        writer: PipeWriter,
        path: &str,
        declared: u64,
        encoded: bool,
        empty: bool,
    ) -> Result<()> {
        let mut writer = Some(writer);
        let result = self
            .decode_content(&mut writer, path, declared, encoded, empty)
            .await;
        if let Some(writer) = writer {
            match &result {
                Ok(()) => writer.finish(),
                Err(error) => writer.abort(error.to_string()),
            }
        }
        result
    }

    async fn decode_content(
        &mut self,
        writer: &mut Option<PipeWriter>,
        path: &str,
        declared: u64,
        encoded: bool,
        empty: bool,
    ) -> Result<()> {
        let mut decoder = TextDecoder::new(encoded);
        let mut actual = 0u64;
        if !empty {
            loop {
                let input = self.reader.get_mut();
                let available = input.fill_buf().await?;
                if available.is_empty() {
                    return Err(ProductIoError::TruncatedContent {
                        path: path.to_string(),
                        expected: declared,
                        actual,
                    });
                }
                let (len, at_markup) = match available.iter().position(|b| *b == b'<') {
                    Some(markup) => (markup, true),
                    None => (available.len(), false),
                };
                let decoded = decoder.push(&available[..len])?;
                input.consume(len);
                deliver(writer, decoded, path, declared, &mut actual).await?;
                if at_markup {
                    break;
                }
            }
        }
        let tail = decoder.finish()?;
        deliver(writer, tail, path, declared, &mut actual).await?;
        if actual < declared {
            return Err(ProductIoError::TruncatedContent {
                path: path.to_string(),
                expected: declared,
                actual,
            });
        }
        Ok(())
    }

    async fn skip_to_end(&mut self, tag: Tag) -> Result<()> {
        loop {
            match self.next_item().await? {
                Item::Close(closed) if closed == tag => return Ok(()),
                Item::Eof => return Err(ProductIoError::malformed("document ended inside element")),
                _ => {}
            }
        }
    }
}

/// Push decoded bytes to the sink, or drop them once the sink hung up.
async fn deliver(
    writer: &mut Option<PipeWriter>,
    chunk: Bytes,
    path: &str,
    declared: u64,
    actual: &mut u64,
) -> Result<()> {
    if chunk.is_empty() {
        return Ok(());
    }
    *actual += chunk.len() as u64;
    if *actual > declared {
        return Err(ProductIoError::ContentLengthMismatch {
            path: path.to_string(),
            declared,
            actual: *actual,
        });
    }
    let closed = match writer.as_ref() {
        Some(open) => open.write(chunk).await.is_err(),
        None => false,
    };
    if closed {
        *writer = None;
    }
    Ok(())
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> ProductSource for XmlProductSource<R> {
    async fn stream_to(&mut self, sink: &mut dyn ProductSink) -> Result<()> {
        let root = self.read_root().await?;
        sink.on_begin(&root.id, &root.status, root.tracker_url.as_ref())
            .await?;
        let result = if root.empty {
            Ok(())
        } else {
            self.stream_body(&mut *sink, &root.id).await
        };
        end_stream(sink, &root.id, result).await
    }
}

/// Input failures stay I/O errors so callers can tell them from bad markup.
fn xml_error(error: quick_xml::Error) -> ProductIoError {
    match error {
        quick_xml::Error::Io(shared) => match Arc::try_unwrap(shared) {
            Ok(error) => ProductIoError::Io(error),
            Err(shared) => ProductIoError::Io(io::Error::new(shared.kind(), shared.to_string())),
        },
        other => ProductIoError::malformed(format!("invalid XML: {other}")),
    }
}

fn open(start: &BytesStart<'_>, empty: bool) -> Result<Item> {
    let tag = Tag::of(start.local_name().as_ref());
    let attributes = if tag == Tag::Other {
        Attributes::new()
    } else {
        read_attributes(start)?
    };
    Ok(Item::Open {
        tag,
        attributes,
        empty,
    })
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|e| ProductIoError::malformed(format!("invalid XML attribute: {e}")))?;
        let name = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| ProductIoError::malformed(format!("invalid XML attribute: {e}")))?
            .into_owned();
        attributes.insert(name, value);
    }
    Ok(attributes)
}

fn required<'a>(attributes: &'a Attributes, element: &str, name: &str) -> Result<&'a str> {
    attributes
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ProductIoError::malformed(format!("{element} is missing '{name}'")))
}

fn parse_root(attributes: Attributes, empty: bool) -> Result<Root> {
    let mut id: ProductId = required(&attributes, "product", "id")?
        .parse()
        .map_err(ProductIoError::malformed)?;
    if let Some(update_time) = attributes.get("updateTime") {
        id = id.with_update_time(parse_date(update_time).map_err(ProductIoError::malformed)?);
    }
    let status = required(&attributes, "product", "status")?.to_string();
    let tracker_url = attributes
        .get("trackerURL")
        .and_then(|tracker| match Url::parse(tracker) {
            Ok(url) => Some(url),
            Err(error) => {
                tracing::debug!(product_id = %id, tracker, %error, "ignoring unparsable tracker URL");
                None
            }
        });
    Ok(Root {
        id,
        status,
        tracker_url,
        empty,
    })
}
