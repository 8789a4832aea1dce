//! Quote state machine.
//!
//! ```text
//! DRAFT     → UPDATE, DELETE, SEND (→ SENT)
//! REJECTED  → UPDATE (→ DRAFT), DELETE
//! SENT, ACCEPTED, EXPIRED, CANCELLED → terminal for agents
//! ```

use crate::error::{CoreError, CoreResult, StateViolation};
use crate::quoting::types::{Operation, Quote, QuoteStatus};

impl QuoteStatus {
    /// Whether `operation` is legal on an existing quote in this status.
    pub fn allows(self, operation: Operation) -> bool {
        matches!(
            (self, operation),
            (QuoteStatus::Draft, Operation::Update | Operation::Delete | Operation::Send)
                | (QuoteStatus::Rejected, Operation::Update | Operation::Delete)
        )
    }

    /// Status reached after `operation` succeeds.
    pub fn after(self, operation: Operation) -> QuoteStatus {
        match (self, operation) {
            (QuoteStatus::Draft, Operation::Send) => QuoteStatus::Sent,
            (QuoteStatus::Rejected, Operation::Update) => QuoteStatus::Draft,
            (status, _) => status,
        }
    }
}

/// First status, in lifecycle order, from which `operation` is permitted.
pub fn first_allowing(operation: Operation) -> Option<QuoteStatus> {
    QuoteStatus::ALL.into_iter().find(|status| status.allows(operation))
}

/// Reject `operation` when the quote's current status forbids it.
pub fn check_transition(quote: &Quote, operation: Operation) -> CoreResult<()> {
    if operation == Operation::Send && quote.status == QuoteStatus::Sent {
        return Err(CoreError::InvalidState(StateViolation::AlreadySent {
            sent_at: quote.sent_at,
        }));
    }
    if !quote.status.allows(operation) {
        return Err(CoreError::InvalidState(StateViolation::Disallowed {
            current: quote.status,
            operation,
            allowed: first_allowing(operation),
        }));
    }
    Ok(())
}

/// Reject the call when an acting agent is given and does not own the quote.
pub fn check_owner(quote: &Quote, acting_agent: Option<&str>) -> CoreResult<()> {
    match acting_agent {
        Some(agent) if agent != quote.agent_id => Err(CoreError::Forbidden {
            reason: format!("agent '{}' does not own quote {}", agent, quote.reference),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quoting::types::NewQuote;
    use chrono::Utc;

    fn quote_in(status: QuoteStatus) -> Quote {
        let mut quote = NewQuote {
            agent_id: "agent-1".into(),
            title: "Safari".into(),
            client_email: "c@example.com".into(),
            total_cents: 500_000,
            currency: "USD".into(),
            notes: None,
            reference: None,
        }
        .into_quote(Utc::now());
        quote.status = status;
        quote
    }

    #[test]
    fn test_transition_table() {
        use Operation::*;
        use QuoteStatus::*;

        let expected = [
            (Draft, [true, true, true]),
            (Sent, [false, false, false]),
            (Accepted, [false, false, false]),
            (Rejected, [true, true, false]),
            (Expired, [false, false, false]),
            (Cancelled, [false, false, false]),
        ];
        for (status, [update, delete, send]) in expected {
            assert_eq!(status.allows(Update), update, "{} update", status);
            assert_eq!(status.allows(Delete), delete, "{} delete", status);
            assert_eq!(status.allows(Send), send, "{} send", status);
            assert!(!status.allows(Create));
        }
    }

    #[test]
    fn test_update_rejected_for_locked_statuses() {
        for status in [QuoteStatus::Sent, QuoteStatus::Accepted, QuoteStatus::Expired, QuoteStatus::Cancelled] {
            let err = check_transition(&quote_in(status), Operation::Update).unwrap_err();
            assert_eq!(
                err,
                CoreError::InvalidState(StateViolation::Disallowed {
                    current: status,
                    operation: Operation::Update,
                    allowed: Some(QuoteStatus::Draft),
                })
            );
        }
        assert!(check_transition(&quote_in(QuoteStatus::Draft), Operation::Update).is_ok());
        assert!(check_transition(&quote_in(QuoteStatus::Rejected), Operation::Update).is_ok());
    }

    #[test]
    fn test_second_send_is_already_sent() {
        let err = check_transition(&quote_in(QuoteStatus::Sent), Operation::Send).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(StateViolation::AlreadySent { .. })));
    }

    #[test]
    fn test_status_after_operation() {
        assert_eq!(QuoteStatus::Draft.after(Operation::Send), QuoteStatus::Sent);
        assert_eq!(QuoteStatus::Rejected.after(Operation::Update), QuoteStatus::Draft);
        assert_eq!(QuoteStatus::Draft.after(Operation::Update), QuoteStatus::Draft);
    }

    #[test]
    fn test_owner_check() {
        let quote = quote_in(QuoteStatus::Draft);
        assert!(check_owner(&quote, None).is_ok());
        assert!(check_owner(&quote, Some("agent-1")).is_ok());
        assert!(matches!(
            check_owner(&quote, Some("agent-2")),
            Err(CoreError::Forbidden { .. })
        ));
    }
}
