//! Request key hashing.

use sha2::{Digest, Sha256};

use crate::http::{Method, Request};

/// Compute the storage key for a request: SHA-256 over method and URL.
///
/// The URL is expected without a fragment (see [`Request::key_url`]).
pub fn compute_request_key(method: Method, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage key of an intercepted request.
pub fn request_key(request: &Request) -> String {
    compute_request_key(request.method, &request.key_url())
}
