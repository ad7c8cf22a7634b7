//! Client key loading and Chef request signing
//!
//! Implements version 1.3 of the Chef authentication protocol: a canonical
//! request string is signed with the client's RSA key (PKCS#1 v1.5, SHA-256)
//! and the base64 signature is split across `X-Ops-Authorization-N` headers.

use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Protocol version sent in `X-Ops-Sign`
pub const SIGN_VERSION: &str = "1.3";

/// Server API version we speak
pub const SERVER_API_VERSION: &str = "1";

/// Width of each `X-Ops-Authorization-N` header value
const AUTHORIZATION_CHUNK: usize = 60;

/// Key loading errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("key is not a valid RSA private key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// RSA private key identifying a Chef API client
#[derive(Clone)]
pub struct ClientKey {
    key: RsaPrivateKey,
}

impl fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientKey").finish_non_exhaustive()
    }
}

impl ClientKey {
    /// Read and parse a PEM key file
    ///
    /// # Errors
    /// Returns `KeyError` if the file is missing, unreadable or not an RSA key.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
            _ => KeyError::Io(e),
        })?;
        debug!(path = %path.display(), "read client key");
        Self::from_pem(&pem)
    }

    /// Parse a PEM key, accepting both PKCS#1 (`RSA PRIVATE KEY`) and
    /// PKCS#8 (`PRIVATE KEY`) encodings
    ///
    /// # Errors
    /// Returns `KeyError::InvalidKey` if neither encoding parses.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let pem = pem.trim();
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Sign raw bytes
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, rsa::signature::Error> {
        let signing_key = SigningKey::<Sha256>::new(self.key.clone());
        let signature = signing_key.try_sign(data)?;
        Ok(signature.to_vec())
    }

    #[cfg(test)]
    pub(crate) fn public_key(&self) -> rsa::RsaPublicKey {
        self.key.to_public_key()
    }
}

/// Headers produced by signing one request
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    headers: Vec<(String, String)>,
}

impl SignedHeaders {
    /// Iterate `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Look up a header by name
    #[cfg(test)]
    fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Reassemble the split authorization signature
    #[must_use]
    pub fn authorization(&self) -> String {
        let mut chunks: Vec<(usize, &str)> = self
            .headers
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix("X-Ops-Authorization-")
                    .and_then(|n| n.parse().ok())
                    .map(|n| (n, v.as_str()))
            })
            .collect();
        chunks.sort_by_key(|(n, _)| *n);
        chunks.into_iter().map(|(_, v)| v).collect()
    }
}

/// Base64 SHA-256 of a request body
#[must_use]
pub fn content_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Build the canonical request string covered by the signature
#[must_use]
pub fn canonical_request(
    method: &str,
    path: &str,
    content_hash: &str,
    timestamp: &str,
    user_id: &str,
) -> String {
    format!(
        "Method:{}\nPath:{}\nX-Ops-Content-Hash:{}\nX-Ops-Sign:version={}\nX-Ops-Timestamp:{}\nX-Ops-UserId:{}\nX-Ops-Server-API-Version:{}",
        method.to_ascii_uppercase(),
        canonical_path(path),
        content_hash,
        SIGN_VERSION,
        timestamp,
        user_id,
        SERVER_API_VERSION,
    )
}

/// Collapse repeated slashes and drop a trailing one
fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' && prev_slash {
            continue;
        }
        prev_slash = c == '/';
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Sign a request, returning every `X-Ops-*` header the server expects
///
/// Without a key only the identification headers are produced; the server
/// will reject such a request.
///
/// # Errors
/// Returns the underlying signature error if RSA signing fails.
pub fn sign_request(
    key: Option<&ClientKey>,
    user_id: &str,
    method: &str,
    path: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<SignedHeaders, rsa::signature::Error> {
    let hash = content_hash(body);
    let timestamp = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();

    let mut headers = vec![
        (
            "X-Ops-Sign".to_string(),
            format!("algorithm=sha256;version={SIGN_VERSION}"),
        ),
        ("X-Ops-UserId".to_string(), user_id.to_string()),
        ("X-Ops-Timestamp".to_string(), timestamp.clone()),
        ("X-Ops-Content-Hash".to_string(), hash.clone()),
        (
            "X-Ops-Server-API-Version".to_string(),
            SERVER_API_VERSION.to_string(),
        ),
    ];

    if let Some(key) = key {
        let canonical = canonical_request(method, path, &hash, &timestamp, user_id);
        let signature = STANDARD.encode(key.sign(canonical.as_bytes())?);
        for (i, chunk) in signature.as_bytes().chunks(AUTHORIZATION_CHUNK).enumerate() {
            headers.push((
                format!("X-Ops-Authorization-{}", i + 1),
                String::from_utf8_lossy(chunk).into_owned(),
            ));
        }
    }

    Ok(SignedHeaders { headers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    const PKCS1_KEY: &str = include_str!("../testdata/client.pem");
    const PKCS8_KEY: &str = include_str!("../testdata/client-pkcs8.pem");

    fn fixed_now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_pkcs1_and_pkcs8() {
        assert!(ClientKey::from_pem(PKCS1_KEY).is_ok());
        assert!(ClientKey::from_pem(PKCS8_KEY).is_ok());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let err = ClientKey::from_pem("not a key").unwrap_err();
        assert!(matches!(err, KeyError::InvalidKey(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ClientKey::from_file("/nonexistent/client.pem").unwrap_err();
        assert!(matches!(err, KeyError::NotFound(_)));
    }

    #[test]
    fn test_content_hash_of_empty_body() {
        assert_eq!(
            content_hash(b""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn test_canonical_request_layout() {
        let canonical = canonical_request(
            "post",
            "/organizations//acme/search/node/",
            "HASH",
            "2023-11-14T22:13:20Z",
            "exporter",
        );
        assert_eq!(
            canonical,
            "Method:POST\n\
             Path:/organizations/acme/search/node\n\
             X-Ops-Content-Hash:HASH\n\
             X-Ops-Sign:version=1.3\n\
             X-Ops-Timestamp:2023-11-14T22:13:20Z\n\
             X-Ops-UserId:exporter\n\
             X-Ops-Server-API-Version:1"
        );
    }

    #[test]
    fn test_signature_verifies() {
        let key = ClientKey::from_pem(PKCS1_KEY).unwrap();
        let body = br#"{"name":["name"]}"#;
        let headers =
            sign_request(Some(&key), "exporter", "POST", "/search/node", body, fixed_now())
                .unwrap();

        assert_eq!(headers.get("X-Ops-Timestamp"), Some("2023-11-14T22:13:20Z"));
        assert_eq!(headers.get("x-ops-userid"), Some("exporter"));

        let canonical = canonical_request(
            "POST",
            "/search/node",
            &content_hash(body),
            "2023-11-14T22:13:20Z",
            "exporter",
        );
        let raw = STANDARD.decode(headers.authorization()).unwrap();
        let signature = Signature::try_from(raw.as_slice()).unwrap();
        let verifier = VerifyingKey::<Sha256>::new(key.public_key());
        assert!(verifier.verify(canonical.as_bytes(), &signature).is_ok());
    }

    #[test]
    fn test_authorization_split_into_chunks() {
        let key = ClientKey::from_pem(PKCS1_KEY).unwrap();
        let headers =
            sign_request(Some(&key), "exporter", "POST", "/search/node", b"", fixed_now())
                .unwrap();

        let chunks: Vec<_> = headers
            .iter()
            .filter(|(k, _)| k.starts_with("X-Ops-Authorization-"))
            .collect();
        // 2048-bit signature = 256 bytes = 344 base64 chars
        assert_eq!(chunks.len(), 6);
        assert!(chunks.iter().all(|(_, v)| v.len() <= AUTHORIZATION_CHUNK));
        assert_eq!(headers.authorization().len(), 344);
    }

    #[test]
    fn test_unsigned_without_key() {
        let headers =
            sign_request(None, "exporter", "POST", "/search/node", b"", fixed_now()).unwrap();
        assert!(headers.get("X-Ops-UserId").is_some());
        assert!(headers.authorization().is_empty());
    }
}
