//! # Canonical Product Digest
//!
//! The bytes a product signature covers. The serialization is deterministic
//! regardless of the order in which a source emits events:
//!
//! | Field | Order |
//! |-------|-------|
//! | id (URN), status | fixed |
//! | properties | sorted by name |
//! | links | sorted by relation, URI order kept within a relation |
//! | contents | sorted by path |
//!
//! Every string is written as a 4-byte big-endian length followed by its
//! UTF-8 bytes; counts and lengths as 8-byte big-endian integers. Signature
//! fields and the tracker URL are not covered.
//!
//! v1 hashes with SHA-1, v2 with SHA-256.

use std::collections::BTreeMap;

use sha1::Sha1;
use sha2::{Digest, Sha256};
use shared_types::{ProductId, SignatureVersion};

/// How a content's bytes are referenced in the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentReference {
    /// Lowercase hex SHA-256 of embedded bytes.
    Embedded(String),
    /// Reference URL string.
    Url(String),
}

/// Digest view of one content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestContent {
    pub content_type: String,
    pub length: u64,
    pub reference: ContentReference,
}

/// Everything the digest covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestInput {
    pub id: String,
    pub status: String,
    pub properties: BTreeMap<String, String>,
    pub links: BTreeMap<String, Vec<String>>,
    pub contents: BTreeMap<String, DigestContent>,
}

impl DigestInput {
    pub fn new(id: &ProductId, status: &str) -> Self {
        Self {
            id: id.to_string(),
            status: status.to_string(),
            properties: BTreeMap::new(),
            links: BTreeMap::new(),
            contents: BTreeMap::new(),
        }
    }

    /// Hash the canonical serialization with the version's algorithm.
    pub fn digest(&self, version: SignatureVersion) -> Vec<u8> {
        match version {
            SignatureVersion::V1 => self.hash_with(Sha1::new()),
            SignatureVersion::V2 => self.hash_with(Sha256::new()),
        }
    }

    fn hash_with<D: Digest>(&self, mut hasher: D) -> Vec<u8> {
        put_str(&mut hasher, &self.id);
        put_str(&mut hasher, &self.status);

        put_u64(&mut hasher, self.properties.len() as u64);
        for (name, value) in &self.properties {
            put_str(&mut hasher, name);
            put_str(&mut hasher, value);
        }

        put_u64(&mut hasher, self.links.len() as u64);
        for (relation, uris) in &self.links {
            put_str(&mut hasher, relation);
            put_u64(&mut hasher, uris.len() as u64);
            for uri in uris {
                put_str(&mut hasher, uri);
            }
        }

        put_u64(&mut hasher, self.contents.len() as u64);
        for (path, content) in &self.contents {
            put_str(&mut hasher, path);
            put_str(&mut hasher, &content.content_type);
            put_u64(&mut hasher, content.length);
            match &content.reference {
                ContentReference::Embedded(sha256) => {
                    hasher.update([0u8]);
                    put_str(&mut hasher, sha256);
                }
                ContentReference::Url(url) => {
                    hasher.update([1u8]);
                    put_str(&mut hasher, url);
                }
            }
        }

        hasher.finalize().to_vec()
    }
}

fn put_str<D: Digest>(hasher: &mut D, value: &str) {
    hasher.update((value.len() as u32).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn put_u64<D: Digest>(hasher: &mut D, value: u64) {
    hasher.update(value.to_be_bytes());
}
