//! Scripted model for tests: replays canned completions and records prompts.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::base_llm::{Completion, CompletionRequest, GenerativeModel, LlmError};

type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<Completion, LlmError> + Send + Sync>;

/// A [`GenerativeModel`] that answers from a script.
///
/// Scripted answers are consumed in order; once the script runs out the
/// responder (if any) answers, otherwise the call fails as unavailable.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<Completion, LlmError>>>,
    responder: Option<Responder>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<Completion, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            responder: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// A model that computes every answer from the request.
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<Completion, LlmError> + Send + Sync + 'static,
    {
        let mut model = Self::new(Vec::new());
        model.responder = Some(Arc::new(responder));
        model
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("remaining", &self.script.lock().len())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        match (scripted, &self.responder) {
            (Some(answer), _) => answer,
            (None, Some(responder)) => responder(&request),
            (None, None) => Err(LlmError::Unavailable {
                message: "script exhausted".to_string(),
            }),
        }
    }
}
