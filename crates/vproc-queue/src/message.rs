//! Messages leased from the work queue.

/// A message received from the work queue and not yet deleted.
///
/// Both fields are optional because the broker does not guarantee them;
/// a message missing either one cannot be processed or acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InFlightMessage {
    /// Broker-assigned id, for logging only
    pub message_id: Option<String>,
    /// Raw message body
    pub body: Option<Vec<u8>>,
    /// Opaque token required to delete the message
    pub receipt_token: Option<String>,
}

impl InFlightMessage {
    pub fn new(body: impl Into<Vec<u8>>, receipt_token: impl Into<String>) -> Self {
        Self {
            message_id: None,
            body: Some(body.into()),
            receipt_token: Some(receipt_token.into()),
        }
    }

    /// Body and receipt token, if both are present.
    pub fn parts(&self) -> Option<(&[u8], &str)> {
        match (&self.body, &self.receipt_token) {
            (Some(body), Some(token)) => Some((body.as_slice(), token.as_str())),
            _ => None,
        }
    }
}
