use std::sync::Arc;

use super::chain::{ChainResult, InferenceChain};
use super::prompts::{describe_prompt, translation_prompt, translator_system_prompt, STEP_SYSTEM_PROMPT};
use super::worker::InferenceWorker;
use crate::settings::SettingsStore;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Delegated,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub result: ChainResult,
    pub path: ExecutionPath,
    /// False means the caller owns persisting `result`.
    pub persisted: bool,
}

/// Sends inference work to the privileged worker and runs the chain in the
/// caller's own context when the worker cannot be reached.
#[derive(Clone)]
pub struct Enricher {
    worker: InferenceWorker,
    chain: Arc<InferenceChain>,
    settings: Arc<SettingsStore>,
}

impl Enricher {
    pub fn new(worker: InferenceWorker, chain: Arc<InferenceChain>, settings: Arc<SettingsStore>) -> Self {
        Self {
            worker,
            chain,
            settings,
        }
    }

    pub async fn describe(&self, image: &str, context: &str, store_for: Option<&str>) -> Description {
        let delegated = self
            .worker
            .describe(
                image.to_string(),
                context.to_string(),
                store_for.map(str::to_string),
            )
            .await;

        match delegated {
            Ok(reply) => Description {
                result: reply.result,
                path: ExecutionPath::Delegated,
                persisted: reply.stored,
            },
            Err(err) => {
                log_warn!("{err}; describing in the local context");
                let prompt = describe_prompt(image, context, &self.settings.current());
                Description {
                    result: self.chain.complete(STEP_SYSTEM_PROMPT, &prompt).await,
                    path: ExecutionPath::Local,
                    persisted: false,
                }
            }
        }
    }

    pub async fn translate(&self, markdown: &str, language_name: &str) -> ChainResult {
        match self
            .worker
            .translate(markdown.to_string(), language_name.to_string())
            .await
        {
            Ok(result) => result,
            Err(err) => {
                log_warn!("{err}; translating in the local context");
                self.chain
                    .complete(
                        &translator_system_prompt(language_name),
                        &translation_prompt(language_name, markdown),
                    )
                    .await
            }
        }
    }
}
