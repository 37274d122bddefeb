use std::default::Default;

/// How the state payload is compressed before it is sealed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    /// Plain JSON payload
    Disabled,
    /// zstd-compressed JSON payload at the given level. Falls back to plain
    /// JSON when the crate is built without `zstd_support`.
    Zstd { level: i32 },
}

cfg_if! {
    if #[cfg(feature = "zstd_support")] {
        impl Default for CompressionMode {
            fn default() -> Self {
                CompressionMode::Zstd { level: 3 }
            }
        }
    } else {
        impl Default for CompressionMode {
            fn default() -> Self {
                CompressionMode::Disabled
            }
        }
    }
}

/// Contains Config properties which will be used to seal and open state tokens
#[derive(Clone)]
pub struct CodecConfig {
    /// Key for the token MAC. Tokens sealed with one secret never open with
    /// another, so every server instance behind a balancer needs the same one.
    pub secret: [u8; 32],
    /// Compression applied to newly encoded tokens. Decoding accepts any mode.
    pub compression: CompressionMode,
}

impl CodecConfig {
    pub fn new(secret: [u8; 32]) -> Self {
        Self {
            secret,
            compression: CompressionMode::default(),
        }
    }

    /// Derives the secret from a passphrase of any length
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self::new(blake3::derive_key("tether state token secret", passphrase.as_bytes()))
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::from_passphrase("tether-development-secret")
    }
}
