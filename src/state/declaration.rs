//! Declaration constraints.
//!
//! Seats declare in order from the round's starter. The four declarations of
//! a round never total [`FORBIDDEN_TOTAL`]. A seat that declared zero in
//! each of the last two rounds must declare the lowest non-zero value that
//! keeps the total off [`FORBIDDEN_TOTAL`].

use crate::error::GameError;

use super::game::SEATS;

/// Highest pile count a seat may declare.
pub const MAX_DECLARATION: u8 = 8;

/// The sum the four declarations must never reach.
pub const FORBIDDEN_TOTAL: u8 = 8;

/// Zero declarations allowed back to back before the lowest non-zero value
/// is required.
pub const MAX_CONSECUTIVE_ZEROS: u8 = 2;

/// Seat indices in declaration order for a starter.
pub fn declaration_order(starter: usize) -> [usize; SEATS] {
    std::array::from_fn(|i| (starter + i) % SEATS)
}

/// The single value the last declarer may not choose, given the three
/// declarations already recorded.
pub fn forbidden_last_value(previous: &[u8]) -> Option<u8> {
    if previous.len() != SEATS - 1 {
        return None;
    }
    let sum: u32 = previous.iter().map(|&v| u32::from(v)).sum();
    u8::try_from(u32::from(FORBIDDEN_TOTAL).checked_sub(sum)?).ok()
}

/// Check one declaration against the values already recorded this round
/// (in declaration order) and the seat's zero streak.
pub fn validate(
    seat: usize,
    value: u8,
    previous: &[u8],
    consecutive_zeros: u8,
) -> Result<(), GameError> {
    let violation = |reason: String| GameError::DeclarationConstraintViolation {
        seat,
        value,
        reason,
    };

    if value > MAX_DECLARATION {
        return Err(violation(format!(
            "declarations range from 0 to {}",
            MAX_DECLARATION
        )));
    }

    if consecutive_zeros >= MAX_CONSECUTIVE_ZEROS {
        let required = lowest_nonzero(previous);
        if value != required {
            return Err(violation(format!(
                "declared zero in the previous {} rounds, must declare {}",
                consecutive_zeros, required
            )));
        }
        return Ok(());
    }

    if forbidden_last_value(previous) == Some(value) {
        return Err(violation(format!(
            "total of all declarations would equal {}",
            FORBIDDEN_TOTAL
        )));
    }

    Ok(())
}

/// Every value the seat may declare right now, ascending.
pub fn legal_values(previous: &[u8], consecutive_zeros: u8) -> Vec<u8> {
    (0..=MAX_DECLARATION)
        .filter(|&v| validate(0, v, previous, consecutive_zeros).is_ok())
        .collect()
}

/// Lowest non-zero value that keeps the total off [`FORBIDDEN_TOTAL`]; the
/// only value a seat on a zero streak may declare.
pub fn lowest_nonzero(previous: &[u8]) -> u8 {
    let forbidden = forbidden_last_value(previous);
    (1..=MAX_DECLARATION)
        .find(|&v| forbidden != Some(v))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_order_wraps_from_starter() {
        assert_eq!(declaration_order(0), [0, 1, 2, 3]);
        assert_eq!(declaration_order(2), [2, 3, 0, 1]);
    }

    #[test]
    fn test_last_declarer_cannot_make_eight() {
        let previous = [3, 1, 0];
        let err = validate(3, 4, &previous, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeclarationConstraintViolation);
        assert!(validate(3, 3, &previous, 0).is_ok());
        assert!(validate(3, 5, &previous, 0).is_ok());
    }

    #[test]
    fn test_no_forbidden_value_when_total_already_exceeds() {
        assert_eq!(forbidden_last_value(&[4, 4, 1]), None);
        assert_eq!(forbidden_last_value(&[4, 4, 0]), Some(0));
        assert_eq!(forbidden_last_value(&[4, 4]), None);
    }

    #[test]
    fn test_earlier_declarers_are_unconstrained_by_sum() {
        assert!(validate(0, 8, &[], 0).is_ok());
        assert!(validate(1, 0, &[8], 0).is_ok());
    }

    #[test]
    fn test_range() {
        assert!(validate(0, 9, &[], 0).is_err());
    }

    #[test]
    fn test_third_consecutive_zero_rejected() {
        assert!(validate(1, 0, &[], 1).is_ok());
        let err = validate(1, 0, &[], 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeclarationConstraintViolation);
        assert!(validate(1, 1, &[], 2).is_ok());
    }

    #[test]
    fn test_zero_streak_requires_lowest_nonzero() {
        let err = validate(0, 5, &[], 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeclarationConstraintViolation);
        assert!(err.to_string().contains("must declare 1"));
        assert!(validate(0, 5, &[], 1).is_ok());
    }

    #[test]
    fn test_zero_streak_skips_value_that_makes_eight() {
        // 2 + 2 + 3 + 1 would total 8, so the lowest allowed is 2.
        assert_eq!(lowest_nonzero(&[2, 2, 3]), 2);
        let err = validate(3, 1, &[2, 2, 3], 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeclarationConstraintViolation);
        assert!(validate(3, 2, &[2, 2, 3], 2).is_ok());
        assert!(validate(3, 3, &[2, 2, 3], 2).is_err());
    }

    #[test]
    fn test_legal_values_and_fallback() {
        assert_eq!(legal_values(&[3, 1, 0], 0), vec![0, 1, 2, 3, 5, 6, 7, 8]);
        assert_eq!(legal_values(&[2, 2, 3], 0), vec![0, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(legal_values(&[2, 2, 3], 2), vec![2]);
        assert_eq!(legal_values(&[], 2), vec![1]);
        assert_eq!(lowest_nonzero(&[]), 1);
    }
}
