//! Payload decryptor
//!
//! Backends obfuscate their source lists with the OpenSSL/CryptoJS salted
//! AES convention: base64 of `"Salted__" + salt(8) + AES-256-CBC
//! ciphertext`, key and IV derived from the shared secret and salt via
//! MD5 `EVP_BytesToKey`. A decrypt failure is the stale-key signal — it
//! is surfaced as [`ResolveError::DecryptionFailed`], distinct from
//! transport failures, so callers can tell "retry another provider" from
//! "rotate the key". This module only consumes a key; it never rotates
//! or refreshes one.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use md5::{Digest, Md5};
use serde::Deserialize;

use super::types::{DecryptedSource, EncryptedEnvelope, MediaSource, PayloadFormat, TrackEntry};
use super::{ResolveError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_PREFIX: &[u8; 8] = b"Salted__";

/// Decryption key material supplied by an external key provider.
///
/// `id` and `version` ride along as resolve-request parameters; the core
/// does not validate freshness beyond observing decrypt failures.
#[derive(Debug, Clone, Default)]
pub struct SourceKey {
    /// Shared secret for the payload cipher.
    pub secret: String,
    /// Key id the backend expects to see echoed back.
    pub id: String,
    /// Key version the backend expects to see echoed back.
    pub version: String,
}

/// Decode a resolved payload into source data, decrypting when the
/// envelope is tagged as encrypted.
///
/// Operates only on full envelopes: a partial or garbled body fails the
/// whole provider attempt and never yields partially-decoded data.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &SourceKey) -> Result<DecryptedSource> {
    let wire: WirePayload = serde_json::from_str(&envelope.body)?;

    let sources: Vec<MediaSource> = match envelope.format {
        PayloadFormat::PlainJson => serde_json::from_value(wire.sources)?,
        PayloadFormat::AesEncryptedJson => {
            let ciphertext = wire.sources.as_str().ok_or_else(|| {
                ResolveError::DecryptionFailed("encrypted payload is not a string".into())
            })?;
            let plaintext = decrypt_text(ciphertext, &key.secret)?;
            serde_json::from_str(&plaintext).map_err(|err| {
                ResolveError::DecryptionFailed(format!("plaintext is not source data: {err}"))
            })?
        }
    };

    Ok(DecryptedSource {
        sources,
        tracks: wire.tracks,
    })
}

/// Decrypt a salted AES-256-CBC base64 blob into UTF-8 text.
pub fn decrypt_text(ciphertext: &str, secret: &str) -> Result<String> {
    let raw = BASE64
        .decode(ciphertext.trim())
        .map_err(|err| ResolveError::DecryptionFailed(format!("invalid base64: {err}")))?;

    if raw.len() < 16 || &raw[..8] != SALT_PREFIX {
        return Err(ResolveError::DecryptionFailed(
            "missing salt header".into(),
        ));
    }

    let mut salt = [0u8; 8];
    salt.copy_from_slice(&raw[8..16]);
    let (cipher_key, iv) = evp_bytes_to_key(secret.as_bytes(), &salt);

    let plaintext = Aes256CbcDec::new(&cipher_key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&raw[16..])
        .map_err(|_| ResolveError::DecryptionFailed("bad padding".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| ResolveError::DecryptionFailed("plaintext is not UTF-8".into()))
}

/// Encrypt text with the same salted convention the backends use.
///
/// Used for sealed query forms and for exercising the round-trip in
/// tests.
pub fn encrypt_text(plaintext: &str, secret: &str) -> String {
    let salt: [u8; 8] = rand::random();
    let (cipher_key, iv) = evp_bytes_to_key(secret.as_bytes(), &salt);

    let ciphertext = Aes256CbcEnc::new(&cipher_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut blob = Vec::with_capacity(16 + ciphertext.len());
    blob.extend_from_slice(SALT_PREFIX);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&ciphertext);
    BASE64.encode(blob)
}

/// Hex MD5 digest.
pub fn md5_hex(data: &str) -> String {
    let digest = Md5::new_with_prefix(data.as_bytes()).finalize();
    let mut out = String::with_capacity(32);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Integrity hash accompanying a sealed query form.
pub fn verify_hash(ciphertext: &str, app_key: &str, secret: &str) -> String {
    md5_hex(&format!("{app_key}{secret}{ciphertext}"))
}

/// OpenSSL `EVP_BytesToKey` with MD5: derives a 32-byte AES key and a
/// 16-byte IV from secret and salt.
fn evp_bytes_to_key(secret: &[u8], salt: &[u8; 8]) -> ([u8; 32], [u8; 16]) {
    let mut derived = Vec::with_capacity(48);
    let mut block: Vec<u8> = Vec::new();

    while derived.len() < 48 {
        let mut hasher = Md5::new();
        hasher.update(&block);
        hasher.update(secret);
        hasher.update(salt);
        block = hasher.finalize().to_vec();
        derived.extend_from_slice(&block);
    }

    let mut cipher_key = [0u8; 32];
    let mut iv = [0u8; 16];
    cipher_key.copy_from_slice(&derived[..32]);
    iv.copy_from_slice(&derived[32..48]);
    (cipher_key, iv)
}

/// Resolve-response wire shape. `sources` stays a raw value because it is
/// either a JSON array (plain backends) or a base64 string (encrypting
/// backends).
#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    sources: serde_json::Value,
    #[serde(default)]
    tracks: Vec<TrackEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key";

    fn key() -> SourceKey {
        SourceKey {
            secret: SECRET.into(),
            id: "kid".into(),
            version: "1".into(),
        }
    }

    #[test]
    fn round_trip() {
        let plaintext = r#"[{"file":"https://cdn.example/master.m3u8"}]"#;
        let ciphertext = encrypt_text(plaintext, SECRET);
        assert_eq!(decrypt_text(&ciphertext, SECRET).unwrap(), plaintext);
    }

    #[test]
    fn round_trip_various_lengths() {
        for len in [1usize, 15, 16, 17, 64, 1000] {
            let plaintext = "x".repeat(len);
            let ciphertext = encrypt_text(&plaintext, SECRET);
            assert_eq!(decrypt_text(&ciphertext, SECRET).unwrap(), plaintext);
        }
    }

    #[test]
    fn garbage_fails_with_decryption_failed() {
        for garbage in ["not base64 at all!!!", "aGVsbG8=", ""] {
            let err = decrypt_text(garbage, SECRET).unwrap_err();
            assert!(matches!(err, ResolveError::DecryptionFailed(_)), "{garbage:?} -> {err}");
        }
    }

    #[test]
    fn wrong_key_fails() {
        let ciphertext = encrypt_text("some plaintext", SECRET);
        let err = decrypt_text(&ciphertext, "another-secret").unwrap_err();
        assert!(matches!(err, ResolveError::DecryptionFailed(_)));
    }

    #[test]
    fn decrypts_encrypted_envelope() {
        let sources = r#"[{"file":"https://cdn.example/master.m3u8"}]"#;
        let body = format!(
            r#"{{"sources":"{}","tracks":[{{"file":"https://cdn.example/en.vtt","label":"English","kind":"captions"}}]}}"#,
            encrypt_text(sources, SECRET)
        );
        let envelope = EncryptedEnvelope {
            body,
            format: PayloadFormat::AesEncryptedJson,
        };

        let decoded = decrypt(&envelope, &key()).unwrap();
        assert_eq!(decoded.sources.len(), 1);
        assert_eq!(decoded.sources[0].url, "https://cdn.example/master.m3u8");
        assert_eq!(decoded.tracks.len(), 1);
    }

    #[test]
    fn plain_envelope_skips_cipher() {
        let envelope = EncryptedEnvelope {
            body: r#"{"sources":[{"file":"https://cdn.example/master.m3u8"}],"tracks":[]}"#.into(),
            format: PayloadFormat::PlainJson,
        };
        let decoded = decrypt(&envelope, &key()).unwrap();
        assert_eq!(decoded.sources.len(), 1);
    }

    #[test]
    fn stale_key_never_yields_partial_data() {
        let sources = r#"[{"file":"https://cdn.example/master.m3u8"}]"#;
        let body = format!(r#"{{"sources":"{}"}}"#, encrypt_text(sources, "old-rotated-key"));
        let envelope = EncryptedEnvelope {
            body,
            format: PayloadFormat::AesEncryptedJson,
        };
        assert!(matches!(
            decrypt(&envelope, &key()),
            Err(ResolveError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn md5_hex_known_vector() {
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }
}
