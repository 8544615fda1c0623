//! # Transport Flows
//!
//! Real sender against a real receiver on a loopback port.
//!
//! | Flow                     | Expectation                              |
//! |--------------------------|------------------------------------------|
//! | first delivery           | `UNKNOWN_PRODUCT`, payload, `STORED`     |
//! | repeat delivery          | `ALREADY_HAVE_PRODUCT`, no payload       |
//! | concurrent same product  | stored once, everyone else already has it|
//! | legacy sender            | stored, raw status reply                 |
//! | oversized payload        | rejected, nothing stored                 |
//! | unknown protocol version | framed `RECEIVE_ERROR`                   |

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pdl_01_product_io::ProductEncoding;
    use pdl_02_socket_transport::{
        ProductSender, ProductStorage, ReceiverConfig, SendOutcome, SenderConfig,
        SocketProductSender,
    };
    use shared_types::sha256_hex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::integration::harness::{document_product, product, RunningReceiver};

    fn receiver_config() -> ReceiverConfig {
        ReceiverConfig {
            name: "it".into(),
            read_timeout: Some(Duration::from_secs(10)),
            ..ReceiverConfig::default()
        }
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    #[tokio::test]
    async fn test_second_delivery_is_already_have() {
        let receiver = RunningReceiver::start(receiver_config(), None).await;
        let sender = receiver.sender(true);
        let product = product("repeat", 2048);

        let first = sender.send_product(&product).await.unwrap();
        assert!(
            matches!(&first, SendOutcome::Sent { status } if status.starts_with("STORED")),
            "unexpected outcome {first:?}"
        );
        assert_eq!(
            sender.send_product(&product).await.unwrap(),
            SendOutcome::AlreadyHave
        );
        assert_eq!(receiver.storage.len(), 1);

        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_senders_store_once() {
        let receiver = RunningReceiver::start(receiver_config(), None).await;
        let product = product("race", 64 * 1024);

        let sends = (0..8).map(|_| {
            let sender = receiver.sender(true);
            let product = product.clone();
            tokio::spawn(async move { sender.send_product(&product).await })
        });
        let outcomes: Vec<SendOutcome> = futures::future::join_all(sends)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let sent = outcomes
            .iter()
            .filter(|o| matches!(o, SendOutcome::Sent { .. }))
            .count();
        assert_eq!(sent, 1);
        assert_eq!(receiver.storage.len(), 1);

        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_unsupported_version_over_tcp() {
        let receiver = RunningReceiver::start(receiver_config(), None).await;
        let mut stream = tokio::net::TcpStream::connect(receiver.addr).await.unwrap();

        stream.write_all(b"PDL").await.unwrap();
        for field in ["9.9", "urn:usgs-product:us:origin:x:1"] {
            stream.write_u32(field.len() as u32).await.unwrap();
            stream.write_all(field.as_bytes()).await.unwrap();
        }
        let len = stream.read_u32().await.unwrap();
        let mut reply = vec![0u8; len as usize];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(
            String::from_utf8(reply).unwrap(),
            "RECEIVE_ERROR 'unsupported protocol version '9.9''"
        );

        receiver.stop().await;
    }

    // =========================================================================
    // PAYLOADS
    // =========================================================================

    #[tokio::test]
    async fn test_legacy_sender() {
        let receiver = RunningReceiver::start(receiver_config(), None).await;
        let product = product("legacy", 512);

        let outcome = receiver.sender(false).send_product(&product).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Sent { .. }));
        assert!(receiver.storage.has_product(&product.id).await.unwrap());

        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_json_encoding() {
        let receiver = RunningReceiver::start(receiver_config(), None).await;
        let product = document_product("json", 4096);
        let sender = SocketProductSender::new(SenderConfig {
            encoding: ProductEncoding::Json,
            ..SenderConfig::new("127.0.0.1", receiver.addr.port())
        });

        assert!(matches!(
            sender.send_product(&product).await.unwrap(),
            SendOutcome::Sent { .. }
        ));
        let stored = receiver.storage.get_product(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.properties, product.properties);
        assert_eq!(stored.links, product.links);
        assert_eq!(stored.contents[""].read_all().await.unwrap().len(), 4096);
        assert_eq!(
            stored.contents["data.bin"].url(),
            product.contents["data.bin"].url()
        );

        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_multi_megabyte_content() {
        let receiver = RunningReceiver::start(receiver_config(), None).await;
        let product = product("large", 3 * 1024 * 1024);
        let expected = product.contents["data.bin"].read_all().await.unwrap();

        receiver.sender(true).send_product(&product).await.unwrap();

        let stored = receiver.storage.get_product(&product.id).await.unwrap().unwrap();
        let content = &stored.contents["data.bin"];
        assert_eq!(content.descriptor.length, expected.len() as u64);
        let bytes = content.read_all().await.unwrap();
        assert_eq!(sha256_hex(&bytes), sha256_hex(&expected));

        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_size_limit_rejects_product() {
        let receiver = RunningReceiver::start(
            ReceiverConfig {
                size_limit: Some(16 * 1024),
                ..receiver_config()
            },
            None,
        )
        .await;
        let product = product("too-big", 256 * 1024);

        // the receiver may reset the connection before the sender reads a status
        let result = receiver.sender(true).send_product(&product).await;
        assert!(result.is_err(), "unexpected result {result:?}");
        assert!(receiver.storage.is_empty());

        receiver.stop().await;
    }
}
