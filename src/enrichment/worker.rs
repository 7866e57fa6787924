//! Privileged inference context.
//!
//! A single task owns the inference chain and serves requests one at a time;
//! the host's inference channel has no pooling, so there is no parallelism to
//! gain. Describe requests may name a step to update, in which case the worker
//! writes the description into durable storage itself.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::chain::{ChainResult, InferenceChain};
use super::prompts::{describe_prompt, translation_prompt, translator_system_prompt, STEP_SYSTEM_PROMPT};
use crate::error::RecorderError;
use crate::settings::SettingsStore;
use crate::storage::Storage;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const QUEUE_DEPTH: usize = 64;

enum WorkerRequest {
    Describe {
        image: String,
        context: String,
        store_for: Option<String>,
        reply: oneshot::Sender<DescribeReply>,
    },
    Translate {
        markdown: String,
        language_name: String,
        reply: oneshot::Sender<ChainResult>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeReply {
    pub result: ChainResult,
    /// True when the worker took care of persisting the description, including
    /// the case where the step had already been deleted.
    pub stored: bool,
}

#[derive(Clone)]
pub struct InferenceWorker {
    sender: mpsc::Sender<WorkerRequest>,
}

impl InferenceWorker {
    pub fn spawn(chain: Arc<InferenceChain>, storage: Storage, settings: Arc<SettingsStore>) -> Self {
        let (sender, mut receiver) = mpsc::channel(QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                match request {
                    WorkerRequest::Describe {
                        image,
                        context,
                        store_for,
                        reply,
                    } => {
                        let prompt = describe_prompt(&image, &context, &settings.current());
                        let result = chain.complete(STEP_SYSTEM_PROMPT, &prompt).await;
                        let stored = match (&result, store_for) {
                            (Ok(completion), Some(step_id)) => {
                                store_description(&storage, &step_id, &completion.text).await
                            }
                            _ => false,
                        };
                        let _ = reply.send(DescribeReply { result, stored });
                    }
                    WorkerRequest::Translate {
                        markdown,
                        language_name,
                        reply,
                    } => {
                        log_info!("translating {} chars to {language_name}", markdown.len());
                        let result = chain
                            .complete(
                                &translator_system_prompt(&language_name),
                                &translation_prompt(&language_name, &markdown),
                            )
                            .await;
                        let _ = reply.send(result);
                    }
                }
            }
            log_debug!("inference worker shutting down");
        });

        Self { sender }
    }

    pub async fn describe(
        &self,
        image: String,
        context: String,
        store_for: Option<String>,
    ) -> Result<DescribeReply, RecorderError> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerRequest::Describe {
            image,
            context,
            store_for,
            reply,
        })
        .await?;
        response
            .await
            .map_err(|_| RecorderError::Unreachable("inference worker"))
    }

    pub async fn translate(
        &self,
        markdown: String,
        language_name: String,
    ) -> Result<ChainResult, RecorderError> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerRequest::Translate {
            markdown,
            language_name,
            reply,
        })
        .await?;
        response
            .await
            .map_err(|_| RecorderError::Unreachable("inference worker"))
    }

    async fn send(&self, request: WorkerRequest) -> Result<(), RecorderError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| RecorderError::Unreachable("inference worker"))
    }
}

async fn store_description(storage: &Storage, step_id: &str, text: &str) -> bool {
    match storage.set_step_description(step_id, text).await {
        Ok(true) => true,
        Ok(false) => {
            log_debug!("step {step_id} was removed before its description arrived");
            true
        }
        Err(err) => {
            log_warn!("failed to store description for step {step_id}: {err:#}");
            false
        }
    }
}
