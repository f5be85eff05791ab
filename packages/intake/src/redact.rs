//! Secret wrapper for the Notion credential.
//!
//! [`Redacted`] keeps the bearer token out of `Debug`, `Display` and any
//! serialized output. Read the inner value through `.0` only where the token
//! is actually sent (the outbound `Authorization` header).

use std::fmt::{self, Debug, Display};

/// Wrapper that prints `<redacted>` instead of its inner value.
///
/// ```ignore
/// use intake::redact::Redacted;
///
/// let token = Redacted("secret_abc".to_string());
/// tracing::info!(token = %token, "Notion client ready");
/// // Logs: token = <redacted>
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}
