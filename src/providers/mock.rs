/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Translates the target block and closes the sentinels
 * - `MockProvider::identity()` - Echoes the target block unchanged
 * - `MockProvider::unterminated()` - Never emits the end sentinel
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::scripted(..)` - Replays a fixed sequence of replies
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{Generation, GenerationRequest, Provider};
use crate::translation::prompts::sentinels::{SENTINEL_END, SENTINEL_START};
use crate::translation::prompts::target_block;

/// One scripted reply
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Return this raw text
    Text(String),
    /// Fail with an API error carrying this status code
    Fail(u16),
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Prefix the target with `[TRANSLATED] ` and close the sentinels
    Working,
    /// Return the target unchanged inside the sentinels
    Identity,
    /// Close the sentinels, then keep talking
    TrailingText,
    /// Return the target without the end sentinel
    Unterminated,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with a server error
    Failing,
    /// Answers like `Working` after a delay
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Replies served before falling back to `behavior`
    script: Arc<Mutex<VecDeque<MockReply>>>,
    /// Request counter
    request_count: Arc<AtomicUsize>,
    /// Every request received, in order
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            script: Arc::new(Mutex::new(VecDeque::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that returns the source text as its translation
    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    /// Create a mock that writes past the end sentinel
    pub fn trailing_text() -> Self {
        Self::new(MockBehavior::TrailingText)
    }

    /// Create a mock that never emits the end sentinel
    pub fn unterminated() -> Self {
        Self::new(MockBehavior::Unterminated)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that waits before answering like `working()`
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a mock that replays `replies`, then behaves like `working()`
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let provider = Self::working();
        provider.script.lock().extend(replies);
        provider
    }

    /// Number of generation calls received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of all requests received
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Build a well-formed answer around `text`
    pub fn wrap_answer(text: &str) -> String {
        format!("{}\n{}\n{}", SENTINEL_START, text, SENTINEL_END)
    }

    fn target_of(request: &GenerationRequest) -> String {
        target_block(&request.prompt).unwrap_or(&request.prompt).to_string()
    }

    fn server_error(message: String) -> ProviderError {
        ProviderError::ApiError { status_code: 500, message }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            script: Arc::clone(&self.script),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let scripted = self.script.lock().pop_front();
        if let Some(reply) = scripted {
            return match reply {
                MockReply::Text(text) => Ok(Generation::text(text)),
                MockReply::Fail(status_code) => Err(ProviderError::from_status(
                    status_code,
                    format!("Scripted failure (request #{})", count + 1),
                )),
            };
        }

        let target = Self::target_of(&request);
        let text = match self.behavior {
            MockBehavior::Working => Self::wrap_answer(&format!("[TRANSLATED] {}", target)),
            MockBehavior::Identity => Self::wrap_answer(&target),
            MockBehavior::TrailingText => format!(
                "{}\nAnd here is an extra paragraph the model invented.",
                Self::wrap_answer(&format!("[TRANSLATED] {}", target))
            ),
            MockBehavior::Unterminated => format!("{}\n[TRANSLATED] {}", SENTINEL_START, target),
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    return Err(Self::server_error(format!(
                        "Simulated intermittent failure (request #{})",
                        count + 1
                    )));
                }
                Self::wrap_answer(&format!("[TRANSLATED] {}", target))
            }
            MockBehavior::Failing => {
                return Err(Self::server_error("Simulated provider failure".to_string()));
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Self::wrap_answer(&format!("[TRANSLATED] {}", target))
            }
        };

        Ok(Generation {
            prompt_tokens: Some(request.prompt.len() as u64),
            completion_tokens: Some(text.len() as u64),
            text,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
