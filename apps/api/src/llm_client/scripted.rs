//! Scripted `LlmBackend` for driving the interview operations in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmBackend, LlmError};

/// Replays queued completion replies in order and records every prompt.
/// Image requests succeed unless the prompt contains one of `failing_images`.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    failing_images: Vec<String>,
    completions: Mutex<Vec<(String, u32)>>,
    image_prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn fail_with(self, error: LlmError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn fail_images_containing(mut self, marker: impl Into<String>) -> Self {
        self.failing_images.push(marker.into());
        self
    }

    /// Prompts and token ceilings passed to `complete`, in call order.
    pub fn completions(&self) -> Vec<(String, u32)> {
        self.completions.lock().unwrap().clone()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        self.completions
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_tokens));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }

    async fn request_image(&self, prompt: &str) -> Result<String, LlmError> {
        let index = {
            let mut prompts = self.image_prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };

        if self.failing_images.iter().any(|m| prompt.contains(m.as_str())) {
            return Err(LlmError::Api {
                status: 500,
                message: "image backend unavailable".to_string(),
            });
        }

        Ok(format!("https://images.test/{index}.png"))
    }
}
