use std::time::Duration;

use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};

use super::RequestScope;
use crate::ComponentError;

/// How a cookie is written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// Sign the value with the server's codec secret. Protected cookies that
    /// don't verify read as missing.
    pub protected: bool,
    /// Lifetime, a session cookie when `None`
    pub max_age: Option<Duration>,
}

impl CookieOptions {
    pub fn protected() -> Self {
        Self {
            protected: true,
            max_age: None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PendingCookie {
    pub(crate) name: String,
    /// Encoded value, `None` when the cookie is being removed
    pub(crate) value: Option<String>,
    pub(crate) header: String,
}

/// JSON values stored in cookies.
///
/// Reads see values written earlier in the same request. Anything that
/// can't be decoded reads as `T::default()`.
pub struct CookieStorage<'c> {
    scope: &'c RequestScope,
}

impl<'c> CookieStorage<'c> {
    pub(crate) fn new(scope: &'c RequestScope) -> Self {
        Self { scope }
    }

    pub fn get<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        self.read(name, false).unwrap_or_default()
    }

    pub fn get_protected<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        self.read(name, true).unwrap_or_default()
    }

    pub fn set<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        options: CookieOptions,
    ) -> Result<(), ComponentError> {
        let json = serde_json::to_vec(value)
            .map_err(|err| ComponentError::serialization(format!("cookie '{name}'"), err))?;
        let encoded = if options.protected {
            self.scope.codec.protect(&purpose(name), &json)
        } else {
            base64::encode_config(json, base64::URL_SAFE_NO_PAD)
        };

        let mut header = format!("{name}={encoded}; Path=/; HttpOnly; SameSite=Lax");
        if let Some(max_age) = options.max_age {
            header.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        self.push(PendingCookie {
            name: name.to_string(),
            value: Some(encoded),
            header,
        });
        Ok(())
    }

    pub fn remove(&self, name: &str) {
        self.push(PendingCookie {
            name: name.to_string(),
            value: None,
            header: format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"),
        });
    }

    fn push(&self, cookie: PendingCookie) {
        let mut pending = self.scope.cookies.lock();
        pending.retain(|existing| existing.name != cookie.name);
        pending.push(cookie);
    }

    fn read<T: DeserializeOwned>(&self, name: &str, protected: bool) -> Option<T> {
        let pending = self
            .scope
            .cookies
            .lock()
            .iter()
            .find(|cookie| cookie.name == name)
            .map(|cookie| cookie.value.clone());
        let raw = match pending {
            Some(value) => value?,
            None => self.scope.request.cookie(name)?.to_string(),
        };

        let bytes = if protected {
            match self.scope.codec.unprotect(&purpose(name), &raw) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("Ignoring cookie '{name}': {err}");
                    return None;
                }
            }
        } else {
            base64::decode_config(&raw, base64::URL_SAFE_NO_PAD).ok()?
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("Cookie '{name}' doesn't hold the expected value: {err}");
                None
            }
        }
    }
}

fn purpose(name: &str) -> String {
    format!("cookie:{name}")
}
