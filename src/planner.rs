use std::time::Duration;

use crate::error::Error;
use crate::recipient::Recipient;

/// The dispatch window a run is expected to fit inside
pub const DISPATCH_WINDOW_MINUTES: u64 = 1440;

/// Split an eligible recipient list into contiguous batches of
/// `emails_per_batch`; the last batch may be smaller. Rejects a zero batch
/// size synchronously, before anything is enqueued.
pub fn plan(
    recipients: &[Recipient],
    emails_per_batch: u32,
) -> Result<Vec<Vec<Recipient>>, Error> {
    if emails_per_batch == 0 {
        return Err(Error::InvalidSettings(
            "emails_per_batch must be greater than zero".to_owned(),
        ));
    }
    Ok(recipients
        .chunks(emails_per_batch as usize)
        .map(|chunk| chunk.to_vec())
        .collect())
}

/// Offsets from run start at which each batch is enqueued: batch i fires at
/// `i * interval_minutes` minutes. Batch 0 always fires immediately.
pub fn schedule(batch_count: usize, interval_minutes: u32) -> Vec<Duration> {
    (0..batch_count)
        .map(|i| Duration::from_secs(i as u64 * u64::from(interval_minutes) * 60))
        .collect()
}

/// Outcome of checking one batch against the daily send limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLimitCheck {
    /// Whether the batch fits under the limit
    pub valid: bool,

    /// How many more recipients may be sent today regardless of batch size
    pub remaining_capacity: u32,
}

/// Pure daily-limit arithmetic: `valid` iff `sent_today + batch_size` fits
/// within `daily_limit`. Callers that treat a zero limit as "no limit" must
/// check that before calling; here zero is a real ceiling.
pub fn validate_daily_limit(sent_today: u32, batch_size: u32, daily_limit: u32) -> DailyLimitCheck {
    DailyLimitCheck {
        valid: u64::from(sent_today) + u64::from(batch_size) <= u64::from(daily_limit),
        remaining_capacity: daily_limit.saturating_sub(sent_today),
    }
}

/// Advisory pre-run check: does the whole plan fit the daily limit and the
/// dispatch window? Surfaced to the caller before a run starts, never
/// enforced mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feasibility {
    pub feasible: bool,

    /// Wall-clock minutes from run start until the last batch is enqueued
    pub estimated_minutes: u64,

    pub issues: Vec<String>,
}

pub fn feasibility(
    total_recipients: usize,
    emails_per_batch: u32,
    interval_minutes: u32,
    daily_limit: u32,
) -> Feasibility {
    let mut issues: Vec<String> = Vec::new();

    let batch_count = if emails_per_batch == 0 {
        0
    } else {
        (total_recipients + emails_per_batch as usize - 1) / emails_per_batch as usize
    };
    let estimated_minutes = batch_count.saturating_sub(1) as u64 * u64::from(interval_minutes);

    if daily_limit > 0 && total_recipients as u64 > u64::from(daily_limit) {
        issues.push(format!(
            "{} recipients exceed the daily send limit of {}",
            total_recipients, daily_limit
        ));
    }
    if estimated_minutes > DISPATCH_WINDOW_MINUTES {
        issues.push(format!(
            "estimated dispatch time of {} minutes exceeds the {}-minute window",
            estimated_minutes, DISPATCH_WINDOW_MINUTES
        ));
    }

    Feasibility {
        feasible: issues.is_empty(),
        estimated_minutes,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipient::RecipientStatus;

    fn recipients(n: usize) -> Vec<Recipient> {
        (0..n)
            .map(|i| Recipient::new(&format!("r{}@example.com", i), RecipientStatus::Active))
            .collect()
    }

    #[test]
    fn test_partition_is_complete_and_ordered() {
        let input = recipients(250);
        let batches = plan(&input, 100).unwrap();
        assert_eq!(batches.len(), 3);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        let total: usize = sizes.iter().sum();
        assert_eq!(total, 250);
        assert_eq!(batches[0][0].email_addr, "r0@example.com");
        assert_eq!(batches[2][49].email_addr, "r249@example.com");
    }

    #[test]
    fn test_exact_multiple_has_no_short_batch() {
        let batches = plan(&recipients(200), 100).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 100));
    }

    #[test]
    fn test_empty_list_plans_no_batches() {
        let batches = plan(&[], 100).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        assert!(plan(&recipients(10), 0).is_err());
    }

    #[test]
    fn test_schedule_offsets_are_exact_multiples() {
        let offsets = schedule(3, 10);
        assert_eq!(
            offsets,
            vec![
                Duration::from_secs(0),
                Duration::from_secs(600),
                Duration::from_secs(1200),
            ]
        );
    }

    #[test]
    fn test_first_batch_fires_immediately() {
        let offsets = schedule(5, 30);
        assert_eq!(offsets[0], Duration::from_secs(0));
    }

    #[test]
    fn test_daily_limit_arithmetic() {
        let check = validate_daily_limit(480, 50, 500);
        assert!(!check.valid);
        assert_eq!(check.remaining_capacity, 20);

        let check = validate_daily_limit(400, 100, 500);
        assert!(check.valid);
        assert_eq!(check.remaining_capacity, 100);

        // Boundary: exactly at the limit is valid
        let check = validate_daily_limit(450, 50, 500);
        assert!(check.valid);

        // Capacity never goes negative
        let check = validate_daily_limit(600, 1, 500);
        assert!(!check.valid);
        assert_eq!(check.remaining_capacity, 0);
    }

    #[test]
    fn test_feasibility_flags_daily_limit_excess() {
        let report = feasibility(1000, 100, 10, 500);
        assert!(!report.feasible);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_feasibility_flags_overlong_schedule() {
        // 26 batches, 1 hour apart: last one fires 25 hours in
        let report = feasibility(2600, 100, 60, 0);
        assert!(!report.feasible);
        assert_eq!(report.estimated_minutes, 1500);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_schedule_ending_exactly_at_the_window_is_feasible() {
        // 25 batches, 1 hour apart: last one fires at the 1440-minute mark
        let report = feasibility(2500, 100, 60, 0);
        assert!(report.feasible);
        assert_eq!(report.estimated_minutes, 1440);
    }

    #[test]
    fn test_feasible_plan_reports_duration() {
        let report = feasibility(250, 100, 10, 500);
        assert!(report.feasible);
        assert_eq!(report.estimated_minutes, 20);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_zero_daily_limit_means_no_limit() {
        let report = feasibility(10_000, 100, 0, 0);
        assert!(report.feasible);
    }
}
