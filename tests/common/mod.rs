// Mock `/process/` endpoint shared by the upload and controller tests

#![allow(dead_code)]

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// One multipart field as seen by the server
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
struct MockState {
    received: Arc<Mutex<Vec<ReceivedPart>>>,
    status: StatusCode,
    body: Value,
}

pub struct MockServer {
    pub base_url: String,
    received: Arc<Mutex<Vec<ReceivedPart>>>,
}

impl MockServer {
    /// Start a server that answers every upload with `status` and `body`
    pub async fn start(status: u16, body: Value) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            received: Arc::clone(&received),
            status: StatusCode::from_u16(status).unwrap(),
            body,
        };

        let app = Router::new()
            .route("/process/", post(process))
            .layer(DefaultBodyLimit::disable())
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            received,
        }
    }

    pub fn received(&self) -> Vec<ReceivedPart> {
        self.received.lock().unwrap().clone()
    }
}

async fn process(
    State(state): State<MockState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let part = ReceivedPart {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
        };
        state.received.lock().unwrap().push(part);
    }

    (state.status, Json(state.body.clone()))
}
