use sha2::{Digest, Sha256};

/// 256-bit random secret, hex encoded (64 chars). `rand::random` draws from
/// the thread-local CSPRNG seeded by the OS.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Fast digest for API bearer tokens, which are looked up by hash.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
