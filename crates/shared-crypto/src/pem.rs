//! PEM framing.
//!
//! The header and footer labels must match. PKCS#8 `ENCRYPTED` labels are
//! refused. Traditional blocks carrying `Proc-Type: 4,ENCRYPTED` are
//! decrypted with the OpenSSL legacy scheme when a password is supplied.

use aes::{Aes128, Aes192, Aes256};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use des::{Des, TdesEde3};
use md5::{Digest, Md5};

use crate::errors::CryptoError;

const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";
const LINE_WIDTH: usize = 64;

/// A decoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// Label between `BEGIN ` and the closing dashes, e.g. `PUBLIC KEY`.
    pub label: String,
    /// DER body.
    pub der: Vec<u8>,
}

/// Whether `bytes` look like PEM (first non-whitespace byte is `-`).
pub fn is_pem(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'-')
}

/// Decode a single unencrypted PEM block.
pub fn decode(text: &str) -> Result<PemBlock, CryptoError> {
    decode_with_password(text, None)
}

/// Decode a single PEM block, decrypting a legacy `Proc-Type: 4,ENCRYPTED`
/// body with `password`.
pub fn decode_with_password(text: &str, password: Option<&str>) -> Result<PemBlock, CryptoError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let header = lines
        .next()
        .ok_or_else(|| CryptoError::MalformedKey("empty PEM input".into()))?;
    let label = header
        .strip_prefix(BEGIN)
        .and_then(|rest| rest.strip_suffix(DASHES))
        .ok_or_else(|| CryptoError::MalformedKey(format!("unexpected PEM header '{header}'")))?;
    if label.contains("ENCRYPTED") {
        return Err(CryptoError::MalformedKey(
            "encrypted keys are not supported".into(),
        ));
    }

    let body: Vec<&str> = lines.collect();
    let (footer, body) = body
        .split_last()
        .ok_or_else(|| CryptoError::MalformedKey("missing PEM footer".into()))?;
    let expected_footer = format!("{END}{label}{DASHES}");
    if *footer != expected_footer {
        return Err(CryptoError::MalformedKey(format!(
            "unexpected PEM footer '{footer}'"
        )));
    }
    // header lines always carry a colon, base64 never does
    let split = body
        .iter()
        .position(|line| !line.contains(':'))
        .unwrap_or(body.len());
    let (headers, body) = body.split_at(split);

    let der = STANDARD
        .decode(body.concat())
        .map_err(|e| CryptoError::MalformedKey(format!("invalid PEM body: {e}")))?;
    let der = match header_value(headers, "Proc-Type") {
        Some(proc_type) if proc_type.ends_with("ENCRYPTED") => {
            let password = password.ok_or_else(|| {
                CryptoError::MalformedKey("encrypted key needs a password".into())
            })?;
            let dek_info = header_value(headers, "DEK-Info").ok_or_else(|| {
                CryptoError::MalformedKey("encrypted PEM without DEK-Info".into())
            })?;
            decrypt_legacy(dek_info, password, &der)?
        }
        _ => der,
    };

    Ok(PemBlock {
        label: label.to_string(),
        der,
    })
}

fn header_value<'a>(headers: &[&'a str], name: &str) -> Option<&'a str> {
    headers.iter().copied().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then_some(value.trim())
    })
}

/// Decrypt an OpenSSL traditional body described by `DEK-Info: <cipher>,<iv>`.
fn decrypt_legacy(dek_info: &str, password: &str, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let (cipher, iv) = dek_info
        .split_once(',')
        .ok_or_else(|| CryptoError::MalformedKey(format!("invalid DEK-Info '{dek_info}'")))?;
    let iv = hex::decode(iv.trim())
        .map_err(|e| CryptoError::MalformedKey(format!("invalid DEK-Info IV: {e}")))?;
    if iv.len() < 8 {
        return Err(CryptoError::MalformedKey("DEK-Info IV is too short".into()));
    }

    let key_len = match cipher.trim() {
        "DES-CBC" => 8,
        "AES-128-CBC" => 16,
        "AES-192-CBC" | "DES-EDE3-CBC" => 24,
        "AES-256-CBC" => 32,
        other => {
            return Err(CryptoError::MalformedKey(format!(
                "unsupported PEM cipher '{other}'"
            )))
        }
    };
    let key = legacy_key(password.as_bytes(), &iv[..8], key_len);

    match cipher.trim() {
        "DES-CBC" => cbc_decrypt::<cbc::Decryptor<Des>>(&key, &iv, data),
        "DES-EDE3-CBC" => cbc_decrypt::<cbc::Decryptor<TdesEde3>>(&key, &iv, data),
        "AES-128-CBC" => cbc_decrypt::<cbc::Decryptor<Aes128>>(&key, &iv, data),
        "AES-192-CBC" => cbc_decrypt::<cbc::Decryptor<Aes192>>(&key, &iv, data),
        _ => cbc_decrypt::<cbc::Decryptor<Aes256>>(&key, &iv, data),
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
fn legacy_key(password: &[u8], salt: &[u8], key_len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_len + 16);
    let mut previous: Vec<u8> = Vec::new();
    while key.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(password);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        key.extend_from_slice(&previous);
    }
    key.truncate(key_len);
    key
}

fn cbc_decrypt<D>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    D: KeyIvInit + BlockDecryptMut,
{
    let decryptor = D::new_from_slices(key, iv)
        .map_err(|_| CryptoError::MalformedKey("DEK-Info IV has the wrong length".into()))?;
    let mut buffer = data.to_vec();
    let plain = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| CryptoError::MalformedKey("unable to decrypt key: bad password".into()))?;
    Ok(plain.to_vec())
}

/// Encode DER as a PEM block with 64-column lines.
pub fn encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 64);
    out.push_str(&format!("{BEGIN}{label}{DASHES}\n"));
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("{END}{label}{DASHES}\n"));
    out
}
