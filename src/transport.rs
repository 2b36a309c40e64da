use crate::message_job::MessageJob;

/// The result of one delivery attempt for a single message job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeliveryResult {
    /// Message was accepted. Provider response included.
    Delivered(String),

    /// Delivery hit a transient error (timeout, 5xx, upstream rate limit).
    /// The queue retries these with backoff, up to the attempt ceiling.
    Deferred(String),

    /// Delivery failed permanently (invalid address, hard bounce).
    /// Never retried.
    Failed(String),
}

impl DeliveryResult {
    pub fn retryable(&self) -> bool {
        match *self {
            DeliveryResult::Deferred(_) => true,
            _ => false,
        }
    }
}

/// The external delivery capability. Implementations own the actual network
/// call (SMTP relay, HTTP provider API, SMS gateway). `send` must be safe to
/// call more than once with the same job content, as the queue retries
/// at-least-once.
pub trait Transport: Send + Sync {
    fn send(&self, job: &MessageJob) -> DeliveryResult;
}
