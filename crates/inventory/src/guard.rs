//! Quantity invariant guard.
//!
//! The single admission rule for stock movements. Both the single-movement and
//! the batch path call [`admit`]; neither re-implements the comparison.

use crate::movement::MovementKind;

/// An expense asked for more than the counter holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InsufficientStock {
    pub available: u64,
    pub requested: u64,
}

/// Decide whether a movement of `amount` is admissible against `current`.
///
/// Arrivals are always admitted (there is no ceiling); expenses are admitted
/// iff `amount <= current`. Pure: no side effects.
pub fn admit(current: u64, kind: MovementKind, amount: u64) -> Result<(), InsufficientStock> {
    match kind {
        MovementKind::Arrival => Ok(()),
        MovementKind::Expense if amount <= current => Ok(()),
        MovementKind::Expense => Err(InsufficientStock {
            available: current,
            requested: amount,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn arrivals_are_always_admitted() {
        assert!(admit(0, MovementKind::Arrival, 1).is_ok());
        assert!(admit(u64::MAX - 1, MovementKind::Arrival, 1).is_ok());
    }

    #[test]
    fn expense_up_to_current_is_admitted() {
        assert!(admit(5, MovementKind::Expense, 5).is_ok());
        assert!(admit(5, MovementKind::Expense, 1).is_ok());
    }

    #[test]
    fn expense_beyond_current_reports_available() {
        let err = admit(5, MovementKind::Expense, 6).unwrap_err();
        assert_eq!(
            err,
            InsufficientStock {
                available: 5,
                requested: 6
            }
        );
    }

    #[test]
    fn expense_against_empty_stock_is_rejected() {
        assert!(admit(0, MovementKind::Expense, 1).is_err());
    }

    proptest! {
        #[test]
        fn expense_admission_matches_comparison(current in 0u64..10_000, amount in 1u64..10_000) {
            let admitted = admit(current, MovementKind::Expense, amount).is_ok();
            prop_assert_eq!(admitted, amount <= current);
        }
    }
}
