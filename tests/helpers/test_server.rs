use super::{TEST_ACCESS_KEY_ID, TEST_BUCKET, TEST_SECRET_ACCESS_KEY};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::put,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use vaultput::Credentials;
use vaultput::auth::verify_signature;
use vaultput::config::BucketSettings;

const SIGNATURE_MISMATCH: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>SignatureDoesNotMatch</Code><Message>The request signature we calculated does not match the signature you provided.</Message></Error>";

/// A PUT received by the mock bucket
#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_length: Option<String>,
    pub date: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Clone)]
struct MockState {
    secret_access_key: String,
    status: StatusCode,
    body: &'static str,
    puts: Arc<Mutex<Vec<RecordedPut>>>,
}

/// Mock bucket that automatically shuts down on drop
///
/// Serves path-style PUTs on a random local port, verifies the SigV2
/// Authorization header and replies with a fixed status and body.
pub struct TestBucket {
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    #[allow(dead_code)] // Keep handle alive to prevent task abort
    handle: JoinHandle<()>,
    addr: SocketAddr,
    puts: Arc<Mutex<Vec<RecordedPut>>>,
}

impl TestBucket {
    /// Start a bucket that accepts uploads with an empty 202
    pub async fn start() -> Self {
        Self::start_with_response(StatusCode::ACCEPTED, "").await
    }

    pub async fn start_with_response(status: StatusCode, body: &'static str) -> Self {
        let puts = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            secret_access_key: TEST_SECRET_ACCESS_KEY.to_string(),
            status,
            body,
            puts: puts.clone(),
        };

        let app = Router::new()
            .route("/{bucket}/{*key}", put(put_object))
            .with_state(state);

        // Bind to a random available port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        TestBucket {
            shutdown_tx: Some(shutdown_tx),
            handle,
            addr,
            puts,
        }
    }

    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Path-style bucket settings pointing at this server
    pub fn bucket_settings(&self, secret_access_key: &str) -> BucketSettings {
        BucketSettings {
            bucket: TEST_BUCKET.to_string(),
            credentials: Credentials::new(TEST_ACCESS_KEY_ID, secret_access_key),
            endpoint: self.endpoint(),
            path_style: true,
        }
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap().clone()
    }
}

impl Drop for TestBucket {
    fn drop(&mut self) {
        // Signal shutdown (ignore errors if already shut down)
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// An endpoint nothing is listening on
pub async fn closed_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn put_object(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Rebuild the resource from the path as sent, without decoding it
    let (bucket, key) = uri
        .path()
        .trim_start_matches('/')
        .split_once('/')
        .map(|(bucket, key)| (bucket.to_string(), key.to_string()))
        .unwrap_or_default();
    let date = header_value(&headers, header::DATE);
    let authorization = header_value(&headers, header::AUTHORIZATION);

    let verified = match (&authorization, &date) {
        (Some(auth), Some(date)) => verify_signature(
            auth,
            "PUT",
            &bucket,
            &key,
            date,
            &state.secret_access_key,
        )
        .is_ok(),
        _ => false,
    };

    state.puts.lock().unwrap().push(RecordedPut {
        bucket,
        key,
        body,
        content_length: header_value(&headers, header::CONTENT_LENGTH),
        date,
        authorization,
    });

    if !verified {
        return (StatusCode::FORBIDDEN, SIGNATURE_MISMATCH).into_response();
    }

    (state.status, state.body).into_response()
}
