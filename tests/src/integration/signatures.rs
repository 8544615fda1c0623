//! # Signature Flows
//!
//! Products signed by the sender, checked by an enforcing receiver.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pdl_02_socket_transport::{
        ProductSender, ProductStorage, ProductVerifier, ReceiverConfig, SendError, SendOutcome,
    };
    use pdl_03_signature_verification::{
        sign_product, ProductKey, ProductKeyChain, SignatureVerifier, VerificationMode,
    };
    use shared_crypto::PrivateKey;
    use shared_types::SignatureVersion;

    use crate::integration::harness::{product, RunningReceiver};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    const RSA_PRIVATE: &[u8] = include_bytes!("../../../crates/shared-crypto/testdata/rsa_private.pem");
    const DSA_PRIVATE: &[u8] = include_bytes!("../../../crates/shared-crypto/testdata/dsa_private.pem");

    fn key(bytes: &[u8]) -> PrivateKey {
        PrivateKey::from_bytes(bytes, None).unwrap()
    }

    async fn enforcing_receiver(mode: VerificationMode) -> RunningReceiver {
        let keychain = ProductKeyChain::new(vec![
            ProductKey::new("rsa", key(RSA_PRIVATE).public_key()).with_sources(vec!["us".into()]),
            ProductKey::new("dsa", key(DSA_PRIVATE).public_key()),
        ]);
        let verifier: Arc<dyn ProductVerifier> =
            Arc::new(SignatureVerifier::new(mode, false, keychain));
        RunningReceiver::start(ReceiverConfig::default(), Some(verifier)).await
    }

    // =========================================================================
    // ENFORCE
    // =========================================================================

    #[tokio::test]
    async fn test_signed_products_accepted() {
        let receiver = enforcing_receiver(VerificationMode::Enforce).await;
        let sender = receiver.sender(true);

        let mut rsa_v2 = product("rsa-v2", 1024);
        sign_product(&mut rsa_v2, &key(RSA_PRIVATE), SignatureVersion::V2)
            .await
            .unwrap();
        let mut dsa_v1 = product("dsa-v1", 1024);
        sign_product(&mut dsa_v1, &key(DSA_PRIVATE), SignatureVersion::V1)
            .await
            .unwrap();

        for signed in [&rsa_v2, &dsa_v1] {
            assert!(matches!(
                sender.send_product(signed).await.unwrap(),
                SendOutcome::Sent { .. }
            ));
            let stored = receiver.storage.get_product(&signed.id).await.unwrap().unwrap();
            assert_eq!(stored.signature, signed.signature);
            assert_eq!(stored.signature_version, signed.signature_version);
        }

        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_unsigned_product_rejected() {
        let receiver = enforcing_receiver(VerificationMode::Enforce).await;
        let unsigned = product("unsigned", 128);

        let result = receiver.sender(true).send_product(&unsigned).await;
        assert!(
            matches!(&result, Err(SendError::Rejected(status)) if status.starts_with("RECEIVE_ERROR")),
            "unexpected result {result:?}"
        );
        assert!(!receiver.storage.has_product(&unsigned.id).await.unwrap());

        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_tampered_product_rejected() {
        let receiver = enforcing_receiver(VerificationMode::Enforce).await;
        let mut tampered = product("tampered", 128);
        sign_product(&mut tampered, &key(RSA_PRIVATE), SignatureVersion::V1)
            .await
            .unwrap();
        tampered.properties.insert("magnitude".into(), "9.9".into());

        assert!(matches!(
            receiver.sender(true).send_product(&tampered).await,
            Err(SendError::Rejected(_))
        ));
        assert!(receiver.storage.is_empty());

        receiver.stop().await;
    }

    // =========================================================================
    // TEST MODE
    // =========================================================================

    #[tokio::test]
    async fn test_mode_stores_unsigned_product() {
        let receiver = enforcing_receiver(VerificationMode::Test).await;
        let unsigned = product("unsigned", 128);

        assert!(matches!(
            receiver.sender(true).send_product(&unsigned).await.unwrap(),
            SendOutcome::Sent { .. }
        ));
        assert!(receiver.storage.has_product(&unsigned.id).await.unwrap());

        receiver.stop().await;
    }
}
