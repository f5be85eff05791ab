//! Whitelist signup submission: parsing, field normalization and validation
//!
//! Browser clients have shipped two field-naming schemes. The current names
//! (`checkbox`, `organisation`, `treasure`, `tg`) are canonical; the older
//! names (`privacyAgreed`, `organization`, `isTreasurer`, `handle`) are still
//! accepted as fallbacks. A field counts as provided when it is present and
//! not `null`, so an explicit `false` under the canonical name wins.

use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

use crate::error::IntakeError;

/// Maximum length of the composed comment, in characters
pub const MAX_COMMENT_CHARS: usize = 150;

/// Approximate assets under management, as offered by the signup form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRange {
    Under100K,
    From100KTo1M,
    From1MTo10M,
    From10MTo100M,
    Over100M,
}

impl AssetRange {
    pub const ALL: [AssetRange; 5] = [
        AssetRange::Under100K,
        AssetRange::From100KTo1M,
        AssetRange::From1MTo10M,
        AssetRange::From10MTo100M,
        AssetRange::Over100M,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetRange::Under100K => "<$100K",
            AssetRange::From100KTo1M => "$100K-$1M",
            AssetRange::From1MTo10M => "$1M-$10M",
            AssetRange::From10MTo100M => "$10M-$100M",
            AssetRange::Over100M => ">$100M",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|r| r.as_str() == raw)
    }
}

/// Submission body exactly as received, before alias resolution
#[derive(Debug, Default, Deserialize)]
pub struct RawSubmission {
    #[serde(default, deserialize_with = "loose_string")]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "loose_bool")]
    pub checkbox: Option<bool>,
    #[serde(default, rename = "privacyAgreed", deserialize_with = "loose_bool")]
    pub privacy_agreed: Option<bool>,

    #[serde(default, rename = "betaAgreed", deserialize_with = "loose_bool")]
    pub beta_agreed: Option<bool>,

    #[serde(default, deserialize_with = "loose_string")]
    pub organisation: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub organization: Option<String>,

    #[serde(default, deserialize_with = "loose_bool")]
    pub treasure: Option<bool>,
    #[serde(default, rename = "isTreasurer", deserialize_with = "loose_bool")]
    pub is_treasurer: Option<bool>,

    #[serde(default, deserialize_with = "loose_string")]
    pub assets: Option<String>,

    #[serde(default, deserialize_with = "loose_string")]
    pub tg: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub handle: Option<String>,

    #[serde(default, deserialize_with = "loose_string")]
    pub comment: Option<String>,
}

/// Normalized, validated submission ready to be forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupSubmission {
    pub email: String,
    pub privacy_agreed: bool,
    pub beta_agreed: bool,
    pub organisation: String,
    pub manages_treasury: bool,
    pub asset_range: Option<AssetRange>,
    pub handle: String,
    pub comment: String,
}

/// Parse a request body into a validated submission.
///
/// The body must be a JSON object; anything else is an invalid body.
pub fn parse_submission(body: &[u8]) -> Result<SignupSubmission, IntakeError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| IntakeError::InvalidBody)?;
    if !value.is_object() {
        return Err(IntakeError::InvalidBody);
    }
    let raw: RawSubmission = serde_json::from_value(value).map_err(|e| {
        tracing::debug!(error = %e, "Rejecting submission body");
        IntakeError::InvalidBody
    })?;
    raw.normalize()
}

impl RawSubmission {
    /// Resolve aliases, apply defaults, and enforce field constraints
    pub fn normalize(self) -> Result<SignupSubmission, IntakeError> {
        let email = self.email.unwrap_or_default().trim().to_string();
        if email.is_empty() {
            return Err(IntakeError::EmailRequired);
        }

        let manages_treasury = self.treasure.or(self.is_treasurer).unwrap_or(false);
        let asset_range = self.assets.as_deref().and_then(|raw| {
            let parsed = AssetRange::parse(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                tracing::debug!(assets = %raw, "Ignoring unknown asset range");
            }
            parsed
        });

        let comment = compose_comment(
            manages_treasury,
            asset_range,
            self.comment.as_deref().unwrap_or(""),
        );
        let len = comment.chars().count();
        if len > MAX_COMMENT_CHARS {
            return Err(IntakeError::CommentTooLong {
                max: MAX_COMMENT_CHARS,
                len,
            });
        }

        Ok(SignupSubmission {
            email,
            privacy_agreed: self.checkbox.or(self.privacy_agreed).unwrap_or(false),
            beta_agreed: self.beta_agreed.unwrap_or(false),
            organisation: self.organisation.or(self.organization).unwrap_or_default(),
            manages_treasury,
            asset_range,
            handle: self.tg.or(self.handle).unwrap_or_default(),
            comment,
        })
    }
}

/// Build the stored comment. The treasury/asset prefix is only emitted when
/// the submitter picked an asset range.
pub fn compose_comment(
    manages_treasury: bool,
    asset_range: Option<AssetRange>,
    user_text: &str,
) -> String {
    match asset_range {
        Some(range) => {
            let prefix = format!(
                "Treasurer: {}, Assets: {}",
                if manages_treasury { "Yes" } else { "No" },
                range.as_str()
            );
            if user_text.is_empty() {
                prefix
            } else {
                format!("{}; {}", prefix, user_text)
            }
        }
        None => user_text.to_string(),
    }
}

/// Booleans as loose clients send them: JSON booleans, non-zero numbers,
/// non-empty strings. `null` means "not provided".
fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_f64().map_or(true, |f| f != 0.0)),
        Value::String(s) => Some(!s.is_empty()),
        Value::Array(_) | Value::Object(_) => Some(true),
    })
}

/// Strings, with scalar values rendered to text. `null` means "not provided".
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(D::Error::custom("expected a string")),
    }
}
