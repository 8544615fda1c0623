//! In-memory product storage.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::{Product, ProductId};

use crate::domain::errors::StorageError;
use crate::ports::outbound::ProductStorage;

/// Products held in a map; contents stay in memory.
#[derive(Debug, Default)]
pub struct InMemoryProductStorage {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored products.
    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

#[async_trait::async_trait]
impl ProductStorage for InMemoryProductStorage {
    async fn has_product(&self, id: &ProductId) -> Result<bool, StorageError> {
        Ok(self.products.read().contains_key(id))
    }

    async fn store_product(&self, product: Product) -> Result<ProductId, StorageError> {
        let mut products = self.products.write();
        if products.contains_key(&product.id) {
            return Err(StorageError::AlreadyExists(product.id));
        }
        let id = product.id.clone();
        products.insert(id.clone(), product);
        Ok(id)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StorageError> {
        Ok(self.products.read().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::dates::from_millis;

    #[tokio::test]
    async fn test_store_once() {
        let storage = InMemoryProductStorage::new();
        let id = ProductId::new("us", "origin", "a", from_millis(1).unwrap());
        assert!(!storage.has_product(&id).await.unwrap());

        storage.store_product(Product::new(id.clone())).await.unwrap();
        assert!(storage.has_product(&id).await.unwrap());
        assert_eq!(storage.len(), 1);
        assert!(matches!(
            storage.store_product(Product::new(id.clone())).await,
            Err(StorageError::AlreadyExists(existing)) if existing == id
        ));
        assert_eq!(storage.get_product(&id).await.unwrap().unwrap().id, id);
    }
}
