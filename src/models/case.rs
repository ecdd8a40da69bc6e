//! Harvest case tracking and the per-case state machine.
//!
//! Each regulatory case ever discovered gets exactly one row that is never
//! deleted; it is both the audit trail and the duplicate-submission guard.
//! Status only moves forward: `pending` -> `fetching` -> one of `fetched`,
//! `no_order`, `error`, `skipped`, and `fetched` -> `processed` once the
//! downstream pipeline confirms completion.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Harvest status of a tracked case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestStatus {
    Pending,
    Fetching,
    Fetched,
    NoOrder,
    Error,
    Skipped,
    Processed,
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::NoOrder => "no_order",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Processed => "processed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetching" => Some(Self::Fetching),
            "fetched" => Some(Self::Fetched),
            "no_order" => Some(Self::NoOrder),
            "error" => Some(Self::Error),
            "skipped" => Some(Self::Skipped),
            "processed" => Some(Self::Processed),
            _ => None,
        }
    }

    /// All known status values, for stats reporting.
    pub fn all() -> &'static [HarvestStatus] {
        &[
            Self::Pending,
            Self::Fetching,
            Self::Fetched,
            Self::NoOrder,
            Self::Error,
            Self::Skipped,
            Self::Processed,
        ]
    }
}

/// One tracked regulatory case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestCase {
    /// Case number, unique and immutable (e.g. `CD 2025-002808`).
    pub case_number: String,
    /// Docket status copied from the upstream feed at discovery time.
    pub docket_status: Option<String>,
    /// Applicant name from the docket feed.
    pub applicant: Option<String>,
    /// County from the docket feed.
    pub county: Option<String>,
    /// Legal description from the docket feed.
    pub legal_description: Option<String>,
    /// Hearing date from the docket feed.
    pub hearing_date: Option<DateTime<Utc>>,
    /// Current harvest status.
    pub status: HarvestStatus,
    /// Number of fetch attempts made. Monotonically non-decreasing.
    pub attempt_count: u32,
    /// When the last fetch attempt started.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Earliest time a retry is eligible. Unset once attempts are exhausted.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Human-readable message from the last failure.
    pub last_error: Option<String>,
    /// Downstream pipeline document id. Once set, never cleared.
    pub document_id: Option<String>,
    /// The portal's own order/document number, once known.
    pub order_number: Option<String>,
    /// Operator-facing note (e.g. multiple order candidates existed).
    pub note: Option<String>,
    /// When the document was successfully fetched and handed off.
    pub fetched_at: Option<DateTime<Utc>>,
    /// When the downstream pipeline confirmed processing.
    pub processed_at: Option<DateTime<Utc>>,
    /// When this case was first discovered.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl HarvestCase {
    /// Create a fresh `pending` case from docket feed fields.
    pub fn new(case_number: String) -> Self {
        let now = Utc::now();
        Self {
            case_number,
            docket_status: None,
            applicant: None,
            county: None,
            legal_description: None,
            hearing_date: None,
            status: HarvestStatus::Pending,
            attempt_count: 0,
            last_attempt_at: None,
            next_retry_at: None,
            last_error: None,
            document_id: None,
            order_number: None,
            note: None,
            fetched_at: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Compute the retry delay for a given 1-indexed attempt number.
    ///
    /// Delay grows as `base_days * 3^(attempt - 1)`: 3, 9, 27, ... days
    /// with the default base of 3.
    pub fn backoff_delay(base_backoff_days: i64, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        Duration::days(base_backoff_days * 3i64.pow(exponent))
    }

    /// Whether this case already carries a harvested document. Such a
    /// case must never be re-fetched: the state machine has no path back
    /// out of `fetched`.
    pub fn has_document(&self) -> bool {
        matches!(
            self.status,
            HarvestStatus::Fetched | HarvestStatus::Processed
        ) || self.document_id.is_some()
    }

    /// Whether this case is in a terminal state given the retry policy.
    pub fn is_terminal(&self, max_attempts: u32) -> bool {
        match self.status {
            HarvestStatus::Processed | HarvestStatus::Skipped => true,
            HarvestStatus::NoOrder | HarvestStatus::Error => self.attempt_count >= max_attempts,
            _ => false,
        }
    }

    /// Whether a retry is due at `now`. `no_order` cases wait out their
    /// backoff deadline; `error` cases are due as soon as the next run
    /// comes around.
    pub fn retry_due(&self, now: DateTime<Utc>, max_attempts: u32) -> bool {
        if self.attempt_count >= max_attempts {
            return false;
        }
        match self.status {
            HarvestStatus::NoOrder => self.next_retry_at.map(|t| t <= now).unwrap_or(false),
            HarvestStatus::Error => true,
            _ => false,
        }
    }

    /// Begin a fetch attempt.
    pub fn mark_fetching(&mut self, now: DateTime<Utc>) {
        self.status = HarvestStatus::Fetching;
        self.attempt_count += 1;
        self.last_attempt_at = Some(now);
        self.updated_at = now;
    }

    /// Record a successful fetch and downstream registration.
    ///
    /// The document id and the `fetched` transition are one logical write;
    /// callers must not mark a case fetched without a registered id.
    pub fn mark_fetched(&mut self, document_id: String, order_number: Option<String>) {
        let now = Utc::now();
        self.status = HarvestStatus::Fetched;
        self.document_id = Some(document_id);
        if order_number.is_some() {
            self.order_number = order_number;
        }
        self.fetched_at = Some(now);
        self.next_retry_at = None;
        self.last_error = None;
        self.updated_at = now;
    }

    /// Record that the portal has no matching order yet, scheduling the
    /// next retry with exponential backoff. Once attempts reach the
    /// configured maximum no further retry is scheduled and the case is
    /// terminal `no_order`.
    pub fn mark_no_order(&mut self, now: DateTime<Utc>, base_backoff_days: i64, max_attempts: u32) {
        self.status = HarvestStatus::NoOrder;
        self.next_retry_at = if self.attempt_count < max_attempts {
            Some(now + Self::backoff_delay(base_backoff_days, self.attempt_count))
        } else {
            None
        };
        self.updated_at = now;
    }

    /// Record a failure. The case stays eligible for re-selection on the
    /// next run until its attempts run out; no backoff deadline is set.
    pub fn mark_error(&mut self, message: &str) {
        let now = Utc::now();
        self.status = HarvestStatus::Error;
        self.last_error = Some(message.to_string());
        self.next_retry_at = None;
        self.updated_at = now;
    }

    /// Record that a document already existed downstream for this case.
    pub fn mark_skipped(&mut self, existing_document_id: Option<String>) {
        let now = Utc::now();
        self.status = HarvestStatus::Skipped;
        if self.document_id.is_none() {
            self.document_id = existing_document_id;
        }
        self.next_retry_at = None;
        self.updated_at = now;
    }

    /// Record downstream-confirmed processing. Only valid from `fetched`;
    /// the state machine never regresses out of a terminal success state.
    pub fn mark_processed(&mut self) {
        if self.status == HarvestStatus::Fetched {
            let now = Utc::now();
            self.status = HarvestStatus::Processed;
            self.processed_at = Some(now);
            self.updated_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_is_base_times_powers_of_three() {
        assert_eq!(HarvestCase::backoff_delay(3, 1), Duration::days(3));
        assert_eq!(HarvestCase::backoff_delay(3, 2), Duration::days(9));
        assert_eq!(HarvestCase::backoff_delay(3, 3), Duration::days(27));
        assert_eq!(HarvestCase::backoff_delay(1, 4), Duration::days(27));
    }

    #[test]
    fn first_no_order_schedules_retry_three_days_out() {
        let now = Utc::now();
        let mut case = HarvestCase::new("CD 2025-002808".to_string());
        case.mark_fetching(now);
        case.mark_no_order(now, 3, 5);

        assert_eq!(case.status, HarvestStatus::NoOrder);
        assert_eq!(case.attempt_count, 1);
        assert_eq!(case.next_retry_at, Some(now + Duration::days(3)));
    }

    #[test]
    fn second_no_order_schedules_nine_days_out() {
        let now = Utc::now();
        let mut case = HarvestCase::new("CD 2025-002808".to_string());
        case.mark_fetching(now);
        case.mark_no_order(now, 3, 5);
        case.mark_fetching(now);
        case.mark_no_order(now, 3, 5);

        assert_eq!(case.attempt_count, 2);
        assert_eq!(case.next_retry_at, Some(now + Duration::days(9)));
    }

    #[test]
    fn exhausted_no_order_stops_scheduling() {
        let now = Utc::now();
        let mut case = HarvestCase::new("CD 2024-000001".to_string());
        for _ in 0..5 {
            case.mark_fetching(now);
            case.mark_no_order(now, 3, 5);
        }

        assert_eq!(case.attempt_count, 5);
        assert_eq!(case.next_retry_at, None);
        assert!(case.is_terminal(5));
        assert!(!case.retry_due(now + Duration::days(365), 5));
    }

    #[test]
    fn retry_due_respects_backoff_deadline() {
        let now = Utc::now();
        let mut case = HarvestCase::new("CD 2024-000002".to_string());
        case.mark_fetching(now);
        case.mark_no_order(now, 3, 5);

        assert!(!case.retry_due(now + Duration::days(2), 5));
        assert!(case.retry_due(now + Duration::days(3), 5));
    }

    #[test]
    fn fetched_case_carries_its_document() {
        let mut case = HarvestCase::new("CD 2025-050000".to_string());
        assert!(!case.has_document());

        case.mark_fetching(Utc::now());
        case.mark_fetched("doc-5".to_string(), None);
        assert!(case.has_document());

        case.mark_processed();
        assert!(case.has_document());
    }

    #[test]
    fn errors_retry_until_attempts_run_out() {
        let now = Utc::now();
        let mut case = HarvestCase::new("CD 2024-000009".to_string());
        case.mark_fetching(now);
        case.mark_error("portal returned 500");

        assert!(!case.is_terminal(5));
        assert!(case.retry_due(now, 5));

        for _ in 0..4 {
            case.mark_fetching(now);
        }
        case.mark_error("portal returned 500");
        assert!(case.is_terminal(5));
        assert!(!case.retry_due(now, 5));
    }

    #[test]
    fn processed_only_reachable_from_fetched() {
        let mut case = HarvestCase::new("CD 2024-000003".to_string());
        case.mark_processed();
        assert_eq!(case.status, HarvestStatus::Pending);

        case.mark_fetching(Utc::now());
        case.mark_fetched("doc-1".to_string(), Some("123456".to_string()));
        case.mark_processed();
        assert_eq!(case.status, HarvestStatus::Processed);
        assert!(case.processed_at.is_some());
    }

    #[test]
    fn skipped_keeps_existing_document_id() {
        let mut case = HarvestCase::new("CD 2024-000004".to_string());
        case.mark_skipped(Some("doc-9".to_string()));
        assert_eq!(case.status, HarvestStatus::Skipped);
        assert_eq!(case.document_id.as_deref(), Some("doc-9"));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in HarvestStatus::all() {
            assert_eq!(HarvestStatus::from_str(status.as_str()), Some(*status));
        }
        assert_eq!(HarvestStatus::from_str("bogus"), None);
    }
}
