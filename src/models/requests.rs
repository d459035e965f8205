use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Priority {
    #[sqlx(rename = "Low")]
    Low,
    #[sqlx(rename = "Medium")]
    Medium,
    #[sqlx(rename = "High")]
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Priority::Low),
            "Medium" => Ok(Priority::Medium),
            "High" => Ok(Priority::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Closed set of request states. The transition graph lives in
/// [`RequestStatus::can_transition_to`] so every edge is pattern-matched
/// exhaustively and an illegal status simply cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum RequestStatus {
    #[sqlx(rename = "Pending")]
    Pending,
    #[serde(rename = "Under Review")]
    #[sqlx(rename = "Under Review")]
    UnderReview,
    #[sqlx(rename = "Approved")]
    Approved,
    #[sqlx(rename = "Rejected")]
    Rejected,
    #[sqlx(rename = "Cancelled")]
    Cancelled,
    #[sqlx(rename = "Completed")]
    Completed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Pending,
        RequestStatus::UnderReview,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Cancelled,
        RequestStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::UnderReview => "Under Review",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Cancelled => "Cancelled",
            RequestStatus::Completed => "Completed",
        }
    }

    /// A terminal state admits no outbound transition. Approved still has the
    /// single Completed edge, so it is not terminal in the graph sense.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Rejected | RequestStatus::Cancelled | RequestStatus::Completed
        )
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Pending, UnderReview) | (Pending, Cancelled) => true,
            (UnderReview, Approved) | (UnderReview, Rejected) | (UnderReview, Cancelled) => true,
            (Approved, Completed) => true,
            _ => false,
        }
    }

    /// Transitions out of Pending/Under Review into a decision are the only
    /// ones that stamp reviewed_by/reviewed_at.
    pub fn records_review(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RequestStatus::Pending),
            "Under Review" => Ok(RequestStatus::UnderReview),
            "Approved" => Ok(RequestStatus::Approved),
            "Rejected" => Ok(RequestStatus::Rejected),
            "Cancelled" => Ok(RequestStatus::Cancelled),
            "Completed" => Ok(RequestStatus::Completed),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PortalRequest {
    // The integer id stays internal; request_uuid is the only identifier
    // callers ever see.
    #[serde(skip_serializing)]
    pub id: i32,
    pub request_uuid: String,
    pub portal_id: String,
    pub submitted_by: i32,
    pub priority: Priority,
    pub status: RequestStatus,
    pub comments: String,
    pub reason: Option<String>,
    pub additional_comment: Option<String>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRequestPayload {
    #[validate(length(
        min = 10,
        max = 2000,
        message = "Comments must be between 10 and 2000 characters"
    ))]
    pub comments: String,
    pub priority: Option<Priority>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRequestPayload {
    #[validate(length(
        min = 10,
        max = 2000,
        message = "Comments must be between 10 and 2000 characters"
    ))]
    pub comments: String,
    // Optional at creation, required on update.
    pub priority: Priority,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusPayload {
    pub status: RequestStatus,
    #[validate(length(max = 1000, message = "Reason must not exceed 1000 characters"))]
    pub reason: Option<String>,
    #[validate(length(
        max = 500,
        message = "Additional comment must not exceed 500 characters"
    ))]
    pub additional_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestFilters {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub portal_id: Option<String>,
    #[serde(default)]
    pub mine: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub scope: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct StatusBreakdown {
    pub pending: i64,
    pub under_review: i64,
    pub approved: i64,
    pub rejected: i64,
    pub cancelled: i64,
    pub completed: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct PriorityBreakdown {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct RequestStatistics {
    pub total: i64,
    pub by_status: StatusBreakdown,
    pub by_priority: PriorityBreakdown,
}

impl RequestStatistics {
    pub fn record_status(&mut self, status: RequestStatus, count: i64) {
        self.total += count;
        match status {
            RequestStatus::Pending => self.by_status.pending += count,
            RequestStatus::UnderReview => self.by_status.under_review += count,
            RequestStatus::Approved => self.by_status.approved += count,
            RequestStatus::Rejected => self.by_status.rejected += count,
            RequestStatus::Cancelled => self.by_status.cancelled += count,
            RequestStatus::Completed => self.by_status.completed += count,
        }
    }

    pub fn record_priority(&mut self, priority: Priority, count: i64) {
        match priority {
            Priority::Low => self.by_priority.low += count,
            Priority::Medium => self.by_priority.medium += count,
            Priority::High => self.by_priority.high += count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use quickcheck::Arbitrary;
    use std::str::FromStr;

    #[test]
    fn pending_moves_to_under_review_or_cancelled_only() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(UnderReview));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn under_review_moves_to_a_decision_or_cancelled_only() {
        use RequestStatus::*;
        assert!(UnderReview.can_transition_to(Approved));
        assert!(UnderReview.can_transition_to(Rejected));
        assert!(UnderReview.can_transition_to(Cancelled));
        assert!(!UnderReview.can_transition_to(Pending));
        assert!(!UnderReview.can_transition_to(Completed));
    }

    #[test]
    fn approved_can_only_be_completed() {
        use RequestStatus::*;
        assert!(Approved.can_transition_to(Completed));
        for next in RequestStatus::ALL {
            if next != Completed {
                assert!(!Approved.can_transition_to(next));
            }
        }
    }

    #[test]
    fn rejected_cancelled_and_completed_are_terminal() {
        use RequestStatus::*;
        for terminal in [Rejected, Cancelled, Completed] {
            assert!(terminal.is_terminal());
            for next in RequestStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn only_decisions_record_a_review() {
        use RequestStatus::*;
        assert!(Approved.records_review());
        assert!(Rejected.records_review());
        for status in [Pending, UnderReview, Cancelled, Completed] {
            assert!(!status.records_review());
        }
    }

    #[test]
    fn every_status_round_trips_through_its_string_form() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::from_str(status.as_str()), Ok(status));
        }
        assert_err!(RequestStatus::from_str("Archived"));
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
        let payload = CreateRequestPayload {
            comments: "Please add a staging portal".to_string(),
            priority: None,
        };
        assert_eq!(payload.priority.unwrap_or_default(), Priority::Medium);
    }

    #[test]
    fn comments_of_length_ten_pass_validation() {
        let payload = CreateRequestPayload {
            comments: "a".repeat(10),
            priority: None,
        };
        assert_ok!(payload.validate());
    }

    #[test]
    fn comments_of_length_nine_fail_validation() {
        let payload = CreateRequestPayload {
            comments: "a".repeat(9),
            priority: None,
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("comments"));
    }

    #[test]
    fn comments_of_length_2001_fail_validation() {
        let payload = CreateRequestPayload {
            comments: "a".repeat(2001),
            priority: Some(Priority::High),
        };
        assert_err!(payload.validate());
    }

    #[test]
    fn a_reason_longer_than_1000_characters_is_rejected() {
        let payload = UpdateStatusPayload {
            status: RequestStatus::Rejected,
            reason: Some("r".repeat(1001)),
            additional_comment: None,
        };
        assert_err!(payload.validate());
    }

    #[test]
    fn an_additional_comment_longer_than_500_characters_is_rejected() {
        let payload = UpdateStatusPayload {
            status: RequestStatus::Approved,
            reason: None,
            additional_comment: Some("c".repeat(501)),
        };
        assert_err!(payload.validate());
    }

    #[test]
    fn under_review_serialises_with_a_space() {
        let json = serde_json::to_string(&RequestStatus::UnderReview).unwrap();
        assert_eq!(json, "\"Under Review\"");
        let parsed: RequestStatus = serde_json::from_str("\"Under Review\"").unwrap();
        assert_eq!(parsed, RequestStatus::UnderReview);
    }

    impl quickcheck::Arbitrary for RequestStatus {
        fn arbitrary<G: quickcheck::Gen>(g: &mut G) -> Self {
            RequestStatus::ALL[usize::arbitrary(g) % RequestStatus::ALL.len()]
        }
    }

    #[quickcheck_macros::quickcheck]
    fn terminal_states_admit_no_outbound_transition(
        from: RequestStatus,
        to: RequestStatus,
    ) -> bool {
        !from.is_terminal() || !from.can_transition_to(to)
    }

    #[quickcheck_macros::quickcheck]
    fn no_transition_ever_targets_pending(from: RequestStatus) -> bool {
        !from.can_transition_to(RequestStatus::Pending)
    }
}
