use std::collections::HashSet;

use crate::recipient::{Recipient, RecipientStatus};
use crate::settings::DispatchSettings;

/// How many recipients survived each filtering pass. Callers report these
/// numbers; they are part of the filter's contract, not incidental logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    /// Recipients as supplied by the recipient source
    pub original: usize,

    /// Recipients left after status exclusions
    pub after_exclusions: usize,

    /// Recipients left after resend policy and dedup; equals the length of
    /// the final list
    pub after_dedup: usize,
}

/// The final recipient list plus the per-pass counts
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub recipients: Vec<Recipient>,
    pub report: FilterReport,
}

/// Apply a campaign's exclusion, resend and dedup rules to a raw recipient
/// list. Pure and deterministic; order of survivors is the order of their
/// first appearance in the input.
///
/// `is_resend` marks this as not the first send of the campaign; on a first
/// send the resend pass is a no-op regardless of the resend settings.
pub fn filter(
    recipients: &[Recipient],
    settings: &DispatchSettings,
    is_resend: bool,
) -> FilterOutcome {
    let original = recipients.len();

    // Exclusion pass
    let mut kept: Vec<Recipient> = recipients
        .iter()
        .filter(|r| !excluded(r.status, settings))
        .cloned()
        .collect();
    let after_exclusions = kept.len();

    // Resend pass
    if is_resend {
        if settings.dont_resend {
            kept.clear();
        } else if settings.resend_to_unopened_only {
            kept.retain(|r| !r.opened);
        }
    }

    // Dedup pass, first occurrence wins
    if settings.send_once_per_contact {
        let mut seen: HashSet<String> = HashSet::new();
        kept.retain(|r| seen.insert(r.email_addr.to_lowercase()));
    }
    let after_dedup = kept.len();

    debug!(
        "(eligibility) {} recipients in, {} after exclusions, {} after dedup",
        original, after_exclusions, after_dedup
    );

    FilterOutcome {
        recipients: kept,
        report: FilterReport {
            original,
            after_exclusions,
            after_dedup,
        },
    }
}

fn excluded(status: RecipientStatus, settings: &DispatchSettings) -> bool {
    match status {
        RecipientStatus::Unsubscribed => settings.exclude_unsubscribed,
        RecipientStatus::Bounced => settings.exclude_bounced,
        RecipientStatus::Inactive => settings.exclude_inactive,
        RecipientStatus::Active => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipient::RecipientStatus::*;

    fn addrs(outcome: &FilterOutcome) -> Vec<&str> {
        outcome
            .recipients
            .iter()
            .map(|r| r.email_addr.as_str())
            .collect()
    }

    #[test]
    fn test_exclusion_flags_drop_matching_statuses() {
        let recipients = vec![
            Recipient::new("a@x.com", Active),
            Recipient::new("b@x.com", Unsubscribed),
            Recipient::new("c@x.com", Bounced),
            Recipient::new("d@x.com", Inactive),
        ];
        let settings = DispatchSettings {
            exclude_unsubscribed: true,
            exclude_bounced: true,
            exclude_inactive: true,
            send_once_per_contact: false,
            ..Default::default()
        };
        let outcome = filter(&recipients, &settings, false);
        assert_eq!(addrs(&outcome), vec!["a@x.com"]);
        assert_eq!(outcome.report.original, 4);
        assert_eq!(outcome.report.after_exclusions, 1);
    }

    #[test]
    fn test_disabled_exclusions_pass_everyone() {
        let recipients = vec![
            Recipient::new("a@x.com", Unsubscribed),
            Recipient::new("b@x.com", Bounced),
            Recipient::new("c@x.com", Inactive),
        ];
        let settings = DispatchSettings {
            exclude_unsubscribed: false,
            exclude_bounced: false,
            exclude_inactive: false,
            send_once_per_contact: false,
            ..Default::default()
        };
        let outcome = filter(&recipients, &settings, false);
        assert_eq!(outcome.recipients.len(), 3);
    }

    #[test]
    fn test_dedup_is_case_insensitive_and_keeps_first() {
        let recipients = vec![
            Recipient::new("First@X.com", Active),
            Recipient::new("second@x.com", Active),
            Recipient::new("first@x.COM", Active),
        ];
        let settings = DispatchSettings {
            send_once_per_contact: true,
            ..Default::default()
        };
        let outcome = filter(&recipients, &settings, false);
        assert_eq!(addrs(&outcome), vec!["First@X.com", "second@x.com"]);
        assert_eq!(outcome.report.after_dedup, 2);
    }

    #[test]
    fn test_resend_rules_are_ignored_on_first_send() {
        let recipients = vec![Recipient::new("a@x.com", Active)];
        let settings = DispatchSettings {
            dont_resend: true,
            resend_to_unopened_only: true,
            ..Default::default()
        };
        let outcome = filter(&recipients, &settings, false);
        assert_eq!(outcome.recipients.len(), 1);
    }

    #[test]
    fn test_dont_resend_empties_a_resend() {
        let recipients = vec![Recipient::new("a@x.com", Active)];
        let settings = DispatchSettings {
            dont_resend: true,
            ..Default::default()
        };
        let outcome = filter(&recipients, &settings, true);
        assert!(outcome.recipients.is_empty());
        assert_eq!(outcome.report.after_dedup, 0);
    }

    #[test]
    fn test_resend_to_unopened_only() {
        let mut opened = Recipient::new("a@x.com", Active);
        opened.opened = true;
        let recipients = vec![opened, Recipient::new("b@x.com", Active)];
        let settings = DispatchSettings {
            resend_to_unopened_only: true,
            ..Default::default()
        };
        let outcome = filter(&recipients, &settings, true);
        assert_eq!(addrs(&outcome), vec!["b@x.com"]);
    }

    #[test]
    fn test_filter_is_deterministic() {
        let recipients = vec![
            Recipient::new("a@x.com", Active),
            Recipient::new("A@X.COM", Active),
            Recipient::new("b@x.com", Unsubscribed),
        ];
        let settings = DispatchSettings::default();
        let first = filter(&recipients, &settings, false);
        let second = filter(&recipients, &settings, false);
        assert_eq!(first.recipients, second.recipients);
        assert_eq!(first.report, second.report);
    }

    // Concrete scenario from the dispatch rules: unsubscribed excluded,
    // duplicate address deduped case-insensitively keeping the first.
    #[test]
    fn test_exclusion_plus_dedup_scenario() {
        let recipients = vec![
            Recipient::new("a@x.com", Active),
            Recipient::new("A@X.COM", Active),
            Recipient::new("b@x.com", Unsubscribed),
        ];
        let settings = DispatchSettings {
            exclude_unsubscribed: true,
            send_once_per_contact: true,
            ..Default::default()
        };
        let outcome = filter(&recipients, &settings, false);
        assert_eq!(addrs(&outcome), vec!["a@x.com"]);
        assert_eq!(outcome.report.original, 3);
        assert_eq!(outcome.report.after_exclusions, 2);
        assert_eq!(outcome.report.after_dedup, 1);
    }
}
