use super::Credentials;
use crate::types::error::SignatureError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, TimeZone};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt::Display;

type HmacSha1 = Hmac<Sha1>;

/// Date header layout: `Mon, 19 Oct 2026 12:00:00 +0000`
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Parsed `AWS <key>:<signature>` authorization header
#[derive(Debug, PartialEq, Eq)]
pub struct AuthorizationInfo {
    pub access_key_id: String,
    pub signature: String,
}

/// Format a timestamp for the Date header and the string to sign
pub fn format_date<Tz>(date: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    date.format(DATE_FORMAT).to_string()
}

/// Build the canonical string to sign
///
/// Layout:
/// HTTPVerb + '\n' +
/// Content-MD5 + '\n' +
/// Content-Type + '\n' +
/// Date + '\n' +
/// CanonicalizedResource
///
/// Content-MD5 and Content-Type are always empty for our uploads, and the
/// resource is `/<bucket>/<key>` regardless of how the bucket is addressed.
pub fn build_string_to_sign(method: &str, date: &str, bucket: &str, key: &str) -> String {
    format!("{}\n\n\n{}\n/{}/{}", method, date, bucket, key)
}

/// Sign a request and return the Authorization header value
///
/// The result has the form `AWS <access-key>:<base64(HMAC-SHA1(secret, string_to_sign))>`.
/// This is a pure function of its inputs; the caller supplies the date.
pub fn sign_request(
    method: &str,
    bucket: &str,
    key: &str,
    date: &str,
    credentials: &Credentials,
) -> String {
    let string_to_sign = build_string_to_sign(method, date, bucket, key);
    tracing::debug!("String to sign: {:?}", string_to_sign);

    let signature = calculate_signature(&credentials.secret_access_key, &string_to_sign);
    format!("AWS {}:{}", credentials.access_key_id, signature)
}

/// Parse an `AWS <AccessKeyId>:<Signature>` authorization header
///
/// Returns InvalidHeader if the prefix is wrong or either part is empty.
/// Used with [`verify_signature`] by servers (and test buckets) that check
/// what vaultput sends.
pub fn parse_authorization_header(header: &str) -> Result<AuthorizationInfo, SignatureError> {
    let rest = header
        .strip_prefix("AWS ")
        .ok_or_else(|| SignatureError::InvalidHeader("expected 'AWS ' prefix".to_string()))?;

    let (access_key_id, signature) = rest
        .split_once(':')
        .ok_or_else(|| SignatureError::InvalidHeader("missing ':' separator".to_string()))?;

    if access_key_id.is_empty() || signature.is_empty() {
        return Err(SignatureError::InvalidHeader(
            "empty access key or signature".to_string(),
        ));
    }

    Ok(AuthorizationInfo {
        access_key_id: access_key_id.to_string(),
        signature: signature.to_string(),
    })
}

/// Verify an authorization header against the request it claims to sign
///
/// The signature is recomputed from `method`, `bucket`, `key` and `date` with
/// the given secret and compared in constant time. vaultput itself only
/// signs; this is the receiving side, for mock buckets in tests.
pub fn verify_signature(
    header: &str,
    method: &str,
    bucket: &str,
    key: &str,
    date: &str,
    secret_key: &str,
) -> Result<AuthorizationInfo, SignatureError> {
    let auth_info = parse_authorization_header(header)?;

    let provided = BASE64
        .decode(&auth_info.signature)
        .map_err(|_| SignatureError::SignatureDoesNotMatch)?;

    let string_to_sign = build_string_to_sign(method, date, bucket, key);
    let mut mac = hmac_sha1(secret_key.as_bytes());
    mac.update(string_to_sign.as_bytes());

    if mac.verify_slice(&provided).is_err() {
        tracing::warn!(
            "Signature mismatch for access key {}",
            auth_info.access_key_id
        );
        return Err(SignatureError::SignatureDoesNotMatch);
    }

    Ok(auth_info)
}

/// Calculate base64(HMAC-SHA1(secret, string_to_sign))
fn calculate_signature(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac = hmac_sha1(secret_key.as_bytes());
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// HMAC-SHA1 helper
fn hmac_sha1(key: &[u8]) -> HmacSha1 {
    // HMAC accepts keys of any length, so this only fails on a broken build
    HmacSha1::new_from_slice(key).expect("HMAC can accept any key length")
}
