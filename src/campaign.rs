/// The identity and message template of a campaign. The orchestrator stamps
/// one `MessageJob` per eligible recipient from this template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: String,

    /// The From address placed on every message of this campaign
    pub from: String,

    pub reply_to: Option<String>,

    pub subject: String,

    pub html_body: String,

    pub text_body: String,

    /// Queue priority for this campaign's jobs. Higher runs first.
    pub priority: u8,
}
