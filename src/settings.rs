/// Per-campaign advanced-sending rules: who to exclude, whether and to whom
/// a resend goes, deduplication, pacing and the daily ceiling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Drop recipients whose status is `Unsubscribed`
    pub exclude_unsubscribed: bool,

    /// Drop recipients whose status is `Bounced`
    pub exclude_bounced: bool,

    /// Drop recipients whose status is `Inactive`
    pub exclude_inactive: bool,

    /// On a resend, send to nobody at all
    pub dont_resend: bool,

    /// On a resend, keep only recipients who never opened
    pub resend_to_unopened_only: bool,

    /// Keep only the first occurrence of each address (case-insensitive)
    pub send_once_per_contact: bool,

    /// How many recipients go into each batch. Must be greater than zero.
    pub emails_per_batch: u32,

    /// Minutes between consecutive batch enqueues. Zero means all batches
    /// are enqueued as fast as the orchestrator gets to them.
    pub interval_minutes: u32,

    /// Ceiling on recipients enqueued per campaign per UTC day. Zero means
    /// no daily limit.
    pub daily_send_limit: u32,
}

impl Default for DispatchSettings {
    fn default() -> DispatchSettings {
        DispatchSettings {
            exclude_unsubscribed: true,
            exclude_bounced: true,
            exclude_inactive: false,
            dont_resend: false,
            resend_to_unopened_only: false,
            send_once_per_contact: true,
            emails_per_batch: 100,
            interval_minutes: 0,
            daily_send_limit: 0,
        }
    }
}

impl DispatchSettings {
    pub fn is_valid(&self) -> bool {
        self.emails_per_batch > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(DispatchSettings::default().is_valid());
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let settings = DispatchSettings {
            emails_per_batch: 0,
            ..Default::default()
        };
        assert!(!settings.is_valid());
    }
}
