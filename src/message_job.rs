use std::collections::HashMap;

use uuid::Uuid;

use crate::campaign::Campaign;

/// One recipient-specific unit of work submitted to the dispatch queue.
/// Consumed exactly once per delivery attempt by a queue worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageJob {
    /// Generated job identity, unique within and across runs
    pub job_id: String,

    pub campaign_id: String,

    pub to: String,

    pub from: String,

    pub reply_to: Option<String>,

    pub subject: String,

    pub html_body: String,

    pub text_body: String,

    /// Queue priority inherited from the campaign. Higher runs first.
    pub priority: u8,

    /// Delivery attempts made so far. Bumped on each transient failure,
    /// never past the configured attempt ceiling.
    pub attempt: u8,

    pub metadata: HashMap<String, String>,
}

impl MessageJob {
    /// Stamp a job for one recipient from a campaign's template
    pub fn for_campaign(campaign: &Campaign, to: &str) -> MessageJob {
        MessageJob {
            job_id: Uuid::new_v4().to_string(),
            campaign_id: campaign.campaign_id.clone(),
            to: to.to_owned(),
            from: campaign.from.clone(),
            reply_to: campaign.reply_to.clone(),
            subject: campaign.subject.clone(),
            html_body: campaign.html_body.clone(),
            text_body: campaign.text_body.clone(),
            priority: campaign.priority,
            attempt: 0,
            metadata: HashMap::new(),
        }
    }
}
