//! # Product I/O Service
//!
//! Encoding detection and the glue between sources and sinks.

use std::io::Cursor;

use shared_types::Product;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, Chain};

use crate::adapters::json::{JsonProductSink, JsonProductSource};
use crate::adapters::object::{ObjectProductSink, ObjectProductSource};
use crate::adapters::xml::{XmlProductSink, XmlProductSource};
use crate::domain::encoding::{ProductEncoding, Sniff};
use crate::domain::errors::{ProductIoError, Result};
use crate::ports::inbound::ProductSource;
use crate::ports::outbound::ProductSink;

/// Most bytes inspected before giving up on detection.
const SNIFF_LIMIT: usize = 1024;
const SNIFF_CHUNK: usize = 64;

/// Input with its inspected prefix put back in front.
pub type Sniffed<R> = Chain<Cursor<Vec<u8>>, R>;

/// A source of either encoding, chosen by inspecting the input.
pub enum AnyProductSource<R> {
    Xml(XmlProductSource<Sniffed<R>>),
    Json(JsonProductSource<Sniffed<R>>),
}

impl<R: AsyncRead + Unpin + Send> AnyProductSource<R> {
    /// Inspect the leading bytes of `input` and build the matching source.
    /// Inspected bytes are replayed, so the source sees the whole input.
    pub async fn detect(mut input: R) -> Result<Self> {
        let mut prefix = Vec::new();
        let encoding = loop {
            match ProductEncoding::sniff(&prefix) {
                Sniff::Known(encoding) => break encoding,
                Sniff::Unknown => return Err(ProductIoError::UnknownEncoding),
                Sniff::NeedMore if prefix.len() >= SNIFF_LIMIT => {
                    return Err(ProductIoError::UnknownEncoding)
                }
                Sniff::NeedMore => {}
            }
            let mut chunk = [0u8; SNIFF_CHUNK];
            let n = input.read(&mut chunk).await?;
            if n == 0 {
                return Err(ProductIoError::UnknownEncoding);
            }
            prefix.extend_from_slice(&chunk[..n]);
        };

        let input = Cursor::new(prefix).chain(input);
        Ok(match encoding {
            ProductEncoding::Xml => AnyProductSource::Xml(XmlProductSource::new(input)),
            ProductEncoding::Json => AnyProductSource::Json(JsonProductSource::new(input)),
        })
    }

    /// Detected encoding.
    pub fn encoding(&self) -> ProductEncoding {
        match self {
            AnyProductSource::Xml(_) => ProductEncoding::Xml,
            AnyProductSource::Json(_) => ProductEncoding::Json,
        }
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> ProductSource for AnyProductSource<R> {
    async fn stream_to(&mut self, sink: &mut dyn ProductSink) -> Result<()> {
        match self {
            AnyProductSource::Xml(source) => source.stream_to(sink).await,
            AnyProductSource::Json(source) => source.stream_to(sink).await,
        }
    }
}

/// Drive `sink` with every event of `source`.
pub async fn transfer(source: &mut dyn ProductSource, sink: &mut dyn ProductSink) -> Result<()> {
    source.stream_to(sink).await
}

/// Decode one product of either encoding from `input`.
pub async fn read_product<R: AsyncRead + Unpin + Send>(input: R) -> Result<Product> {
    let mut source = AnyProductSource::detect(input).await?;
    let mut sink = ObjectProductSink::new();
    transfer(&mut source, &mut sink).await?;
    sink.take_product()
        .ok_or(ProductIoError::UnexpectedEvent("product stream did not complete"))
}

/// Encode `product` to `out`, returning the writer.
pub async fn write_product<W: AsyncWrite + Unpin + Send>(
    product: &Product,
    encoding: ProductEncoding,
    out: W,
) -> Result<W> {
    let mut source = ObjectProductSource::new(product);
    match encoding {
        ProductEncoding::Xml => {
            let mut sink = XmlProductSink::new(out);
            transfer(&mut source, &mut sink).await?;
            Ok(sink.into_inner())
        }
        ProductEncoding::Json => {
            let mut sink = JsonProductSink::new(out);
            transfer(&mut source, &mut sink).await?;
            Ok(sink.into_inner())
        }
    }
}
