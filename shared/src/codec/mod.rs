mod config;
mod error;
mod state;

pub use config::{CodecConfig, CompressionMode};
pub use error::StateTokenError;
pub use state::{ComponentState, StateMap, StateToken};

use log::warn;
use serde_json::Value;

use state::expect_object;

const MAC_LEN: usize = blake3::OUT_LEN;

/// Plain JSON object of declared state, no instance metadata
const VERSION_LEGACY: u8 = 1;
/// Flags byte followed by a [`ComponentState`] document
const VERSION_CURRENT: u8 = 2;

const FLAG_ZSTD: u8 = 0b0000_0001;

/// Domain separation between state tokens and other protected values
const PURPOSE_STATE: &[u8] = b"state";

/// Seals component state into tokens and opens them again.
///
/// A token is `base64url(version ‖ body ‖ mac)` where the MAC is a keyed
/// BLAKE3 hash of `version ‖ body`. Opening fails closed: a token that fails
/// any check is rejected as a whole.
#[derive(Clone)]
pub struct StateCodec {
    secret: [u8; 32],
    compression: CompressionMode,
}

impl StateCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            secret: config.secret,
            compression: config.compression,
        }
    }

    /// Encodes state with the current token version
    pub fn encode(&self, state: &ComponentState) -> Result<StateToken, StateTokenError> {
        let json = serde_json::to_vec(state).map_err(|err| StateTokenError::InvalidPayload {
            reason: err.to_string(),
        })?;
        let (flags, payload) = self.compress(json)?;

        let mut body = Vec::with_capacity(payload.len() + 1);
        body.push(flags);
        body.extend_from_slice(&payload);
        Ok(StateToken::new(self.seal(PURPOSE_STATE, VERSION_CURRENT, &body)))
    }

    /// Encodes only the declared properties in the legacy layout.
    ///
    /// Readers accept both layouts, so this is what a deployment writes while
    /// older servers are still draining.
    pub fn encode_legacy(&self, state: &StateMap) -> Result<StateToken, StateTokenError> {
        let json = serde_json::to_vec(state).map_err(|err| StateTokenError::InvalidPayload {
            reason: err.to_string(),
        })?;
        Ok(StateToken::new(self.seal(PURPOSE_STATE, VERSION_LEGACY, &json)))
    }

    pub fn decode(&self, token: &str) -> Result<ComponentState, StateTokenError> {
        let (version, body) = self.open(PURPOSE_STATE, token)?;
        match version {
            VERSION_LEGACY => {
                let value: Value = serde_json::from_slice(&body).map_err(|err| {
                    StateTokenError::InvalidPayload {
                        reason: err.to_string(),
                    }
                })?;
                let state = expect_object(value).ok_or_else(|| StateTokenError::InvalidPayload {
                    reason: "legacy payload is not a JSON object".to_string(),
                })?;
                Ok(ComponentState::from_state(state))
            }
            VERSION_CURRENT => {
                let Some((&flags, payload)) = body.split_first() else {
                    return Err(StateTokenError::InvalidPayload {
                        reason: "missing flags byte".to_string(),
                    });
                };
                let json = decompress(flags, payload)?;
                serde_json::from_slice(&json).map_err(|err| StateTokenError::InvalidPayload {
                    reason: err.to_string(),
                })
            }
            version => Err(StateTokenError::UnknownVersion { version }),
        }
    }

    /// Signs arbitrary bytes for storage on the client (cookies).
    ///
    /// The value is tamper-evident, not encrypted.
    pub fn protect(&self, purpose: &str, data: &[u8]) -> String {
        self.seal(purpose.as_bytes(), VERSION_CURRENT, data)
    }

    /// Reverses [`StateCodec::protect`] for the same purpose
    pub fn unprotect(&self, purpose: &str, sealed: &str) -> Result<Vec<u8>, StateTokenError> {
        let (version, body) = self.open(purpose.as_bytes(), sealed)?;
        if version != VERSION_CURRENT {
            return Err(StateTokenError::UnknownVersion { version });
        }
        Ok(body)
    }

    fn seal(&self, purpose: &[u8], version: u8, body: &[u8]) -> String {
        let mut bytes = Vec::with_capacity(body.len() + 1 + MAC_LEN);
        bytes.push(version);
        bytes.extend_from_slice(body);
        let mac = self.mac(purpose, &bytes);
        bytes.extend_from_slice(mac.as_bytes());
        base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
    }

    fn open(&self, purpose: &[u8], token: &str) -> Result<(u8, Vec<u8>), StateTokenError> {
        let mut bytes = base64::decode_config(token.trim(), base64::URL_SAFE_NO_PAD).map_err(
            |err| StateTokenError::NotBase64 {
                reason: err.to_string(),
            },
        )?;
        if bytes.len() < 1 + MAC_LEN {
            return Err(StateTokenError::TooShort {
                length: bytes.len(),
            });
        }

        let mac_start = bytes.len() - MAC_LEN;
        let mut expected = [0u8; MAC_LEN];
        expected.copy_from_slice(&bytes[mac_start..]);
        bytes.truncate(mac_start);

        // Hash equality is constant time
        if self.mac(purpose, &bytes) != blake3::Hash::from(expected) {
            warn!("Rejected a state token that failed its integrity check");
            return Err(StateTokenError::IntegrityCheckFailed);
        }

        let version = bytes.remove(0);
        Ok((version, bytes))
    }

    fn mac(&self, purpose: &[u8], bytes: &[u8]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.secret);
        hasher.update(&(purpose.len() as u64).to_le_bytes());
        hasher.update(purpose);
        hasher.update(bytes);
        hasher.finalize()
    }

    fn compress(&self, json: Vec<u8>) -> Result<(u8, Vec<u8>), StateTokenError> {
        match self.compression {
            CompressionMode::Disabled => Ok((0, json)),
            CompressionMode::Zstd { level } => compress_zstd(json, level),
        }
    }
}

fn decompress(flags: u8, payload: &[u8]) -> Result<Vec<u8>, StateTokenError> {
    if flags & FLAG_ZSTD == 0 {
        return Ok(payload.to_vec());
    }
    decompress_zstd(payload)
}

cfg_if! {
    if #[cfg(feature = "zstd_support")] {
        fn compress_zstd(json: Vec<u8>, level: i32) -> Result<(u8, Vec<u8>), StateTokenError> {
            let compressed = zstd::stream::encode_all(json.as_slice(), level).map_err(|err| {
                StateTokenError::Compression {
                    reason: err.to_string(),
                }
            })?;
            Ok((FLAG_ZSTD, compressed))
        }

        fn decompress_zstd(payload: &[u8]) -> Result<Vec<u8>, StateTokenError> {
            zstd::stream::decode_all(payload).map_err(|err| StateTokenError::Compression {
                reason: err.to_string(),
            })
        }
    } else {
        fn compress_zstd(json: Vec<u8>, _level: i32) -> Result<(u8, Vec<u8>), StateTokenError> {
            warn!("zstd compression requested for state tokens but zstd_support is disabled");
            Ok((0, json))
        }

        fn decompress_zstd(_payload: &[u8]) -> Result<Vec<u8>, StateTokenError> {
            Err(StateTokenError::CompressionUnsupported)
        }
    }
}
