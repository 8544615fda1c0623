//! # Integration Flows
//!
//! - `transport`: handshake, legacy mode, limits and locking across real sockets
//! - `signatures`: signed products through an enforcing receiver

pub mod signatures;
pub mod transport;

#[cfg(test)]
pub(crate) mod harness {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use pdl_02_socket_transport::{
        InMemoryProductStorage, ProductVerifier, ReceiverConfig, SenderConfig,
        SocketProductReceiver, SocketProductSender,
    };
    use shared_types::dates::from_millis;
    use shared_types::{Content, ContentDescriptor, Product, ProductId};
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    /// A receiver on an ephemeral loopback port.
    pub(crate) struct RunningReceiver {
        pub addr: SocketAddr,
        pub storage: Arc<InMemoryProductStorage>,
        stop: Option<oneshot::Sender<()>>,
        task: JoinHandle<()>,
    }

    impl RunningReceiver {
        pub(crate) async fn start(
            config: ReceiverConfig,
            verifier: Option<Arc<dyn ProductVerifier>>,
        ) -> Self {
            let storage = Arc::new(InMemoryProductStorage::new());
            let mut receiver = SocketProductReceiver::new(config, storage.clone());
            if let Some(verifier) = verifier {
                receiver = receiver.with_verifier(verifier);
            }
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (stop, stopped) = oneshot::channel::<()>();
            let task = tokio::spawn(async move {
                Arc::new(receiver)
                    .run(listener, async move {
                        let _ = stopped.await;
                    })
                    .await
                    .unwrap();
            });
            Self {
                addr,
                storage,
                stop: Some(stop),
                task,
            }
        }

        pub(crate) fn sender(&self, versioned: bool) -> SocketProductSender {
            SocketProductSender::new(SenderConfig {
                versioned,
                ..SenderConfig::new(self.addr.ip().to_string(), self.addr.port())
            })
        }

        pub(crate) async fn stop(mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            (&mut self.task).await.unwrap();
        }
    }

    pub(crate) fn product(code: &str, content_len: usize) -> Product {
        let id = ProductId::new("us", "origin", code, from_millis(1_700_000_000_000).unwrap());
        let mut product = Product::new(id);
        product.status = "UPDATE".into();
        product.properties.insert("eventsource".into(), "us".into());
        product.add_link("related", "https://earthquake.example.com/".parse().unwrap());
        let bytes: Vec<u8> = (0..content_len).map(|i| (i % 251) as u8).collect();
        product
            .contents
            .insert("data.bin".into(), Content::from_bytes("application/octet-stream", bytes));
        product
    }

    /// A product the JSON document form can carry: primary bytes plus a
    /// reference.
    pub(crate) fn document_product(code: &str, primary_len: usize) -> Product {
        let mut product = product(code, 0);
        product.contents.clear();
        product
            .contents
            .insert(String::new(), Content::from_bytes("text/plain", vec![b'p'; primary_len]));
        product.contents.insert(
            "data.bin".into(),
            Content::from_url(
                ContentDescriptor::new(
                    "application/octet-stream",
                    2048,
                    from_millis(1_700_000_000_000).unwrap(),
                ),
                "https://earthquake.example.com/data.bin".parse().unwrap(),
            ),
        );
        product
    }
}
