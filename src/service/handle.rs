use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use super::handler::{failure, BackgroundService};
use super::messages::{Request, Response};
use crate::error::RecorderError;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

const QUEUE_DEPTH: usize = 64;

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Client side of the background service. Cloneable; every clone talks to
/// the same service task.
#[derive(Clone)]
pub struct ServiceHandle {
    sender: mpsc::Sender<Envelope>,
}

impl ServiceHandle {
    /// Runs `service` on its own task. Each request is answered from a task of
    /// its own so a slow request (enrichment, translation) does not hold up
    /// state queries.
    pub fn spawn(service: BackgroundService) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(Envelope { request, reply }) = receiver.recv().await {
                let service = service.clone();
                tokio::spawn(async move {
                    let response = service.handle(request).await;
                    if reply.send(response).is_err() {
                        log_debug!("requester went away before the reply was ready");
                    }
                });
            }
            log_debug!("background service shutting down");
        });

        Self { sender }
    }

    pub async fn request(&self, request: Request) -> Result<Response, RecorderError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| RecorderError::Unreachable("background service"))?;
        response
            .await
            .map_err(|_| RecorderError::Unreachable("background service"))
    }

    /// Raw JSON entry point. Unknown message types and an unreachable service
    /// both come back as `{ok: false, error}` bodies.
    pub async fn request_value(&self, message: Value) -> Value {
        let response = match Request::from_value(message) {
            Ok(request) => self
                .request(request)
                .await
                .unwrap_or_else(|err| Response::failed(err.code())),
            Err(err) => failure(&err),
        };
        response
            .to_json()
            .unwrap_or_else(|err| json!({"ok": false, "error": format!("{err:#}")}))
    }
}
