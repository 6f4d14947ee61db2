//! Order lifecycle state machine.
//!
//! The transition table is explicit: anything not listed is rejected with
//! a typed error, including re-running `processed` on an order that is
//! already processed, which would otherwise debit stock a second time.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::ServiceError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processed,
    Completed,
    Cancelled,
}

/// What a transition does to the stock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// Status change only.
    None,
    /// Validate availability under row locks, then debit each line.
    Debit,
}

/// The transition table. `pending -> processed` is the only stock-effecting
/// edge; `completed` and `cancelled` are terminal.
pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<StockEffect, ServiceError> {
    use OrderStatus::*;

    match (from, to) {
        (Pending, Processed) => Ok(StockEffect::Debit),
        (Pending, Cancelled) => Ok(StockEffect::None),
        (Processed, Completed) | (Processed, Cancelled) => Ok(StockEffect::None),
        _ => Err(ServiceError::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// Parses a wire status string, mapping unknown values to a validation
/// error before any transaction opens.
pub fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    raw.parse::<OrderStatus>().map_err(|_| {
        ServiceError::ValidationError(format!(
            "unknown order status '{}'; valid statuses are: pending, processed, completed, cancelled",
            raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Processed, StockEffect::Debit)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled, StockEffect::None)]
    #[case(OrderStatus::Processed, OrderStatus::Completed, StockEffect::None)]
    #[case(OrderStatus::Processed, OrderStatus::Cancelled, StockEffect::None)]
    fn allowed_transitions(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
        #[case] effect: StockEffect,
    ) {
        assert_eq!(transition(from, to).unwrap(), effect);
    }

    #[rstest]
    // Re-processing would double-debit the ledger.
    #[case(OrderStatus::Processed, OrderStatus::Processed)]
    // Terminal states stay terminal.
    #[case(OrderStatus::Completed, OrderStatus::Pending)]
    #[case(OrderStatus::Completed, OrderStatus::Cancelled)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending)]
    #[case(OrderStatus::Cancelled, OrderStatus::Processed)]
    // No skipping the processed step.
    #[case(OrderStatus::Pending, OrderStatus::Completed)]
    // Same-state writes are not silent no-ops.
    #[case(OrderStatus::Pending, OrderStatus::Pending)]
    fn rejected_transitions(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        let err = transition(from, to).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidStatusTransition { .. }
        ));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processed,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(parse_status(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let err = parse_status("shipped").unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
