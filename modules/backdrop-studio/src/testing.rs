// Test mocks for the edit pipeline.
//
// MockEditor (ImageEditor): scripted replies, recorded calls, and an optional
// gate that holds every reply until the test releases it. The gate makes
// "user acts while the request is in flight" scenarios deterministic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::traits::ImageEditor;

#[derive(Debug, Clone)]
pub enum MockReply {
    /// Base64 body of the returned image.
    Image(String),
    NoImage,
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct EditCall {
    pub mime_type: String,
    pub base64_data: String,
    pub prompt: String,
}

/// Replies are consumed in order; the last one repeats once the script runs out.
/// With no script at all, every call fails.
pub struct MockEditor {
    replies: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<EditCall>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockEditor {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn reply(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn image(self, base64: &str) -> Self {
        self.reply(MockReply::Image(base64.to_string()))
    }

    pub fn no_image(self) -> Self {
        self.reply(MockReply::NoImage)
    }

    pub fn fail(self, message: &str) -> Self {
        self.reply(MockReply::Fail(message.to_string()))
    }

    /// Hold every reply until a permit is added to the returned semaphore.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> Vec<EditCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_reply(&self) -> Option<MockReply> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

impl Default for MockEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageEditor for MockEditor {
    async fn edit(
        &self,
        mime_type: &str,
        base64_data: &str,
        prompt: &str,
    ) -> Result<Option<String>> {
        self.calls.lock().unwrap().push(EditCall {
            mime_type: mime_type.to_string(),
            base64_data: base64_data.to_string(),
            prompt: prompt.to_string(),
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        match self.next_reply() {
            Some(MockReply::Image(data)) => Ok(Some(data)),
            Some(MockReply::NoImage) => Ok(None),
            Some(MockReply::Fail(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("MockEditor: no reply scripted")),
        }
    }
}
