use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Number of digest bytes kept for an id (128 bits)
const DIGEST_BYTES: usize = 16;

/// Stable identifier of a rendered component instance.
///
/// Always `W` followed by 32 upper-case hex characters, so it can be used
/// verbatim as an element `id` and as a key in the client's bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Validates an id coming back from a client. Ids are only ever minted by
    /// [`derive_id`], so anything that doesn't have that shape is rejected
    /// before it can reach markup or a cache key.
    pub fn try_from_wire(raw: &str) -> Result<Self, IdentityError> {
        let Some(hex) = raw.strip_prefix('W') else {
            return Err(IdentityError::MissingPrefix {
                raw: raw.to_string(),
            });
        };
        if hex.len() != DIGEST_BYTES * 2 {
            return Err(IdentityError::WrongLength {
                raw: raw.to_string(),
                length: hex.len(),
            });
        }
        if !hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        {
            return Err(IdentityError::NotHex {
                raw: raw.to_string(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the id of a component from its position in the tree.
///
/// `parent` is the parent component's id, or for a root rendered on a full
/// page, a per-render nonce. The result is deterministic in all three inputs.
pub fn derive_id(parent: &str, type_name: &str, key: Option<&str>) -> ComponentId {
    let mut hasher = blake3::Hasher::new();
    update_field(&mut hasher, parent);
    update_field(&mut hasher, type_name);
    match key {
        Some(key) => {
            hasher.update(&[1]);
            update_field(&mut hasher, key);
        }
        None => {
            hasher.update(&[0]);
        }
    }
    let digest = hasher.finalize();

    let mut id = String::with_capacity(1 + DIGEST_BYTES * 2);
    id.push('W');
    for byte in &digest.as_bytes()[..DIGEST_BYTES] {
        id.push_str(&format!("{byte:02X}"));
    }
    ComponentId(id)
}

/// Length-prefixed, so no two splits of the same bytes hash alike
fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

/// Whether a nested component is already present in the client's DOM and
/// should be sent as a placeholder instead of being mounted again.
pub fn is_already_rendered(id: &ComponentId, rendered_ids: &[ComponentId]) -> bool {
    rendered_ids.iter().any(|rendered| rendered == id)
}

/// Markup sent in place of a nested component the client already has.
pub fn placeholder(id: &ComponentId) -> String {
    format!("<div id=\"{id}\" key=\"{id}\" tether tether-placeholder></div>")
}
