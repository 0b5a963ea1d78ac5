// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! Bearer-credential payload decoding and claim alias resolution.
//!
//! The credential is an opaque three-segment string (header.payload.signature)
//! of which only the payload is ever read. Decoding here is **advisory only**:
//! the signature is never checked client-side, so nothing in this module may
//! be used as an authorization decision. It exists solely for display values
//! (name, role badge) and expiry bookkeeping; the server re-validates every
//! request.
//!
//! Issuers disagree on claim naming (short OIDC names, camelCase variants,
//! long-form URI claims), so each semantic field is resolved through a fixed
//! alias list rather than a single key.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Decoded token payload: a free-form claim mapping.
pub type Claims = serde_json::Map<String, Value>;

/// Failure to read a credential payload.
///
/// Only [`decode`] can fail; alias resolution over an already-decoded
/// mapping is total.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The token does not have exactly three dot-separated segments.
    #[error("credential must have exactly three dot-separated segments")]
    SegmentCount,
    /// The payload segment is not valid base64url.
    #[error("credential payload is not valid base64url")]
    Base64,
    /// The decoded payload bytes are not valid UTF-8 JSON.
    #[error("credential payload is not valid JSON: {0}")]
    Json(String),
    /// The payload decoded, but is not a JSON object.
    #[error("credential payload is not a JSON object")]
    NotAnObject,
}

/// Semantic fields resolvable from a claim mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimField {
    Role,
    UserId,
    GivenName,
    FamilyName,
    FullName,
}

impl ClaimField {
    /// Alias list for this field, in resolution order.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            ClaimField::Role => &[
                "role",
                "http://schemas.microsoft.com/ws/2008/06/identity/claims/role",
            ],
            ClaimField::UserId => &[
                "userId",
                "userid",
                "UserId",
                "uid",
                "sub",
                "nameid",
                "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier",
            ],
            ClaimField::GivenName => &[
                "given_name",
                "firstName",
                "firstname",
                "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname",
            ],
            ClaimField::FamilyName => &[
                "family_name",
                "lastName",
                "lastname",
                "surname",
                "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname",
            ],
            ClaimField::FullName => &[
                "name",
                "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name",
            ],
        }
    }
}

/// Decode the payload segment of a credential into a claim mapping.
///
/// Performs no signature verification; see the module docs.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::SegmentCount);
    }

    // Some issuers pad the payload segment; base64url proper does not.
    let payload = segments[1].trim_end_matches('=');
    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|_| DecodeError::Base64)?;

    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Resolve a semantic field through its alias list.
///
/// Returns the first alias whose value is a present, non-blank string,
/// trimmed. Missing fields are `None`, never an error.
pub fn resolve(claims: &Claims, field: ClaimField) -> Option<&str> {
    for alias in field.aliases() {
        if let Some(Value::String(s)) = claims.get(*alias) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
    None
}

/// Expiry instant from the `exp` claim (seconds since epoch), if present
/// and numeric.
pub fn expiry(claims: &Claims) -> Option<DateTime<Utc>> {
    let exp = claims.get("exp")?;
    let seconds = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

/// Display name with fallback: explicit full-name claim, else the trimmed
/// join of given + family name, else `None`.
pub fn display_name(claims: &Claims) -> Option<String> {
    if let Some(name) = resolve(claims, ClaimField::FullName) {
        return Some(name.to_string());
    }

    let parts: Vec<&str> = [
        resolve(claims, ClaimField::GivenName),
        resolve(claims, ClaimField::FamilyName),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Build an unsigned test credential around the given payload.
#[cfg(test)]
pub(crate) fn forge_token(payload: &Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
    format!("{header}.{body}.sig")
}
