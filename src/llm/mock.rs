/// Scripted completion oracle for tests.
///
/// Rules are checked in insertion order; the first rule whose needle occurs
/// in the prompt decides the response. Every prompt is recorded.
use std::sync::Mutex;

use super::{Completer, LlmError};

enum Reply {
    Text(String),
    Fail,
}

pub struct MockCompleter {
    rules: Vec<(String, Reply)>,
    default: String,
    calls: Mutex<Vec<String>>,
}

impl MockCompleter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: String::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Respond with `response` to any prompt containing `needle`.
    #[must_use]
    pub fn with_rule(mut self, needle: &str, response: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Text(response.to_string())));
        self
    }

    /// Fail any prompt containing `needle` with a transport error.
    #[must_use]
    pub fn with_failure(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Fail));
        self
    }

    /// Response used when no rule matches (empty string by default).
    #[must_use]
    pub fn with_default(mut self, response: &str) -> Self {
        self.default = response.to_string();
        self
    }

    /// All prompts received so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl Default for MockCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for MockCompleter {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.to_string());
        }

        for (needle, reply) in &self.rules {
            if prompt.contains(needle.as_str()) {
                return match reply {
                    Reply::Text(text) => Ok(text.clone()),
                    Reply::Fail => Err(LlmError::RequestFailed(format!(
                        "scripted failure for '{needle}'"
                    ))),
                };
            }
        }

        Ok(self.default.clone())
    }

    fn model(&self) -> &str {
        "mock"
    }
}
