/// Subscription state of a recipient, as of the moment a dispatch run
/// begins. The engine never mutates this; it reflects what the recipient
/// source knew before the send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Active,
    Unsubscribed,
    Bounced,
    Inactive,
}

/// One addressable target of a campaign send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// The recipient's email address. Also the dedup key, compared
    /// case-insensitively.
    pub email_addr: String,

    /// Subscription state before this send began
    pub status: RecipientStatus,

    /// Whether the recipient opened a previous send of this campaign
    pub opened: bool,

    /// Whether the recipient clicked through a previous send of this campaign
    pub clicked: bool,
}

impl Recipient {
    pub fn new(email_addr: &str, status: RecipientStatus) -> Recipient {
        Recipient {
            email_addr: email_addr.to_owned(),
            status,
            opened: false,
            clicked: false,
        }
    }
}
