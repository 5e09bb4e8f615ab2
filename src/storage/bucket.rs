use crate::auth::{Credentials, format_date, sign_request};
use crate::config::BucketSettings;
use crate::storage::backend::ObjectStore;
use crate::types::error::UploadError;
use crate::types::{SignedRequest, UploadReceipt};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, DATE, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

/// Fixed bound on the whole PUT, connect included
pub const UPLOAD_TIMEOUT: Duration = Duration::from_millis(5000);

/// Whether `key` can go into the request path and the signed resource unchanged
///
/// Anything outside this set would be percent-encoded on the wire (or cut
/// off at `#`/`?`) while the signature covers the raw text.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | ':' | '@' | ',' | '=')
        })
}

/// S3 XML error body, only used to log the error code
#[derive(Deserialize)]
#[serde(rename = "Error")]
struct S3ErrorBody {
    #[serde(rename = "Code")]
    code: String,
}

/// Uploads objects to a bucket with a single SigV2-signed PUT
pub struct BucketStore {
    client: reqwest::Client,
    bucket: String,
    endpoint: String,
    path_style: bool,
    credentials: Credentials,
}

impl BucketStore {
    pub fn new(settings: &BucketSettings) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| UploadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            bucket: settings.bucket.clone(),
            endpoint: settings.endpoint.clone(),
            path_style: settings.path_style,
            credentials: settings.credentials.clone(),
        })
    }

    /// Target URL for an object
    ///
    /// Virtual-hosted: `http://<bucket>.<endpoint>/<key>`
    /// Path-style: `http://<endpoint>/<bucket>/<key>`
    pub fn object_url(&self, key: &str) -> String {
        if self.path_style {
            format!("http://{}/{}/{}", self.endpoint, self.bucket, key)
        } else {
            format!("http://{}.{}/{}", self.bucket, self.endpoint, key)
        }
    }

    /// Build the signed PUT for `key` using the given Date header value
    pub fn sign_put(&self, key: &str, content_length: u64, date: &str) -> SignedRequest {
        let authorization = sign_request("PUT", &self.bucket, key, date, &self.credentials);

        SignedRequest {
            method: "PUT",
            url: self.object_url(key),
            date: date.to_string(),
            authorization,
            content_length,
        }
    }

    fn headers(request: &SignedRequest) -> Result<HeaderMap, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            DATE,
            HeaderValue::from_str(&request.date).map_err(|_| UploadError::InvalidHeader("Date"))?,
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(request.content_length));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&request.authorization)
                .map_err(|_| UploadError::InvalidHeader("Authorization"))?,
        );
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl ObjectStore for BucketStore {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<UploadReceipt, UploadError> {
        if !is_safe_key(key) {
            return Err(UploadError::UnsafeKey(key.to_string()));
        }

        // Fresh date and signature for every attempt
        let date = format_date(&chrono::Local::now());
        let request = self.sign_put(key, data.len() as u64, &date);

        tracing::info!(
            "PUT object: bucket={}, key={}, bytes={}",
            self.bucket,
            key,
            request.content_length
        );
        tracing::debug!("PUT {}\n{}", request.url, request.header_block());

        let headers = Self::headers(&request)?;
        let result = self
            .client
            .put(&request.url)
            .headers(headers)
            .body(data)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let message = error_chain(&err);
                tracing::error!("Upload of {} failed: {}", key, message);
                return Err(UploadError::Transport(message));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) if status.is_success() => {
                tracing::debug!("Ignoring unreadable body on {}: {}", status, err);
                String::new()
            }
            Err(err) => return Err(UploadError::Transport(error_chain(&err))),
        };

        classify_response(key, status, body, request.content_length)
    }
}

/// Decide whether the bucket accepted the upload
///
/// Any 2xx is success, including a 202 Accepted whose body is empty. Every
/// other status is a failure carrying the body text unmodified.
pub fn classify_response(
    key: &str,
    status: StatusCode,
    body: String,
    bytes_sent: u64,
) -> Result<UploadReceipt, UploadError> {
    if status.is_success() {
        if body.is_empty() {
            tracing::debug!("Upload accepted with {} and an empty body", status);
        }
        return Ok(UploadReceipt {
            key: key.to_string(),
            status: status.as_u16(),
            bytes_sent,
        });
    }

    match quick_xml::de::from_str::<S3ErrorBody>(&body) {
        Ok(error) => tracing::warn!("Bucket rejected {} with {}: {}", key, status, error.code),
        Err(_) => tracing::warn!("Bucket rejected {} with {}", key, status),
    }

    Err(UploadError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
