//! Encode/decode throughput for the two wire encodings.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdl_01_product_io::{read_product, write_product, ProductEncoding};
use shared_types::dates::from_millis;
use shared_types::{Content, Product, ProductId};

fn product(content_len: usize) -> Product {
    let id = ProductId::new("us", "bench", "p1", from_millis(1_700_000_000_000).unwrap());
    let mut product = Product::new(id);
    product.properties.insert("magnitude".into(), "5.1".into());
    // primary content, so the JSON document can carry it inline
    product.contents.insert(
        String::new(),
        Content::from_bytes("application/octet-stream", vec![42u8; content_len]),
    );
    product
}

fn bench_encodings(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("product_io");

    for size in [4 * 1024, 1024 * 1024] {
        let product = product(size);
        group.throughput(Throughput::Bytes(size as u64));

        for encoding in [ProductEncoding::Xml, ProductEncoding::Json] {
            let encoded = rt
                .block_on(write_product(&product, encoding, Vec::new()))
                .unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("encode_{encoding}"), size),
                &product,
                |b, product| {
                    b.to_async(&rt)
                        .iter(|| async { write_product(product, encoding, Vec::new()).await.unwrap() })
                },
            );
            group.bench_with_input(
                BenchmarkId::new(format!("decode_{encoding}"), size),
                &encoded,
                |b, encoded| {
                    b.to_async(&rt)
                        .iter(|| async { read_product(encoded.as_slice()).await.unwrap() })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_encodings);
criterion_main!(benches);
