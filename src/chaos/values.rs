//! Field value synthesis.
//!
//! The explorer fills unprotected fields before each AID key. Values come
//! from operator-supplied hints when possible — transaction codes for the
//! first field of a screen, known data everywhere — and fall back to random
//! generation shaped by the field's attributes (digits for numeric fields,
//! a fixed alphanumeric alphabet otherwise) and clipped to the field's
//! capacity.

// Rust guideline compliant 2026-01

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::screen::Field;

/// Alphabet for random non-numeric values.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ";

/// Digits for random numeric values.
const DIGITS: &[u8] = b"0123456789";

/// Probability that the first field of a screen gets a transaction hint.
const TRANSACTION_BIAS: f64 = 0.75;

/// One operator hint: a transaction code and data known to mean something
/// to the target application.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChaosHint {
    /// Transaction code (typed into the first field of a screen).
    #[serde(default)]
    pub transaction: String,
    /// Values worth typing into any field.
    #[serde(default)]
    pub known_data: Vec<String>,
}

/// Deduplicated hint pools, built once per engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HintPools {
    transactions: Vec<String>,
    known_data: Vec<String>,
}

impl HintPools {
    /// Normalize raw hints: trim, drop empties, dedupe preserving order.
    #[must_use]
    pub fn from_hints(hints: &[ChaosHint]) -> Self {
        let mut transactions: Vec<String> = Vec::new();
        let mut known_data: Vec<String> = Vec::new();
        for hint in hints {
            let tx = hint.transaction.trim();
            if !tx.is_empty() && !transactions.iter().any(|t| t == tx) {
                transactions.push(tx.to_string());
            }
            for datum in &hint.known_data {
                let datum = datum.trim();
                if !datum.is_empty() && !known_data.iter().any(|d| d == datum) {
                    known_data.push(datum.to_string());
                }
            }
        }
        Self {
            transactions,
            known_data,
        }
    }

    /// True when no usable hints were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.known_data.is_empty()
    }

    /// Pick a hint candidate for a field, or `None` without hints.
    ///
    /// The first field of a screen usually wants a transaction code, so it
    /// draws from the transaction pool with probability
    /// [`TRANSACTION_BIAS`]; all other draws use known data, falling back
    /// to transactions when no data was supplied.
    fn pick(&self, rng: &mut StdRng, prefer_transaction: bool) -> Option<&str> {
        if self.is_empty() {
            return None;
        }
        let from_transactions = if prefer_transaction && !self.transactions.is_empty() {
            self.known_data.is_empty() || rng.random_bool(TRANSACTION_BIAS)
        } else {
            self.known_data.is_empty()
        };
        let pool = if from_transactions {
            &self.transactions
        } else {
            &self.known_data
        };
        let pool = if pool.is_empty() {
            &self.transactions
        } else {
            pool
        };
        Some(pool[rng.random_range(0..pool.len())].as_str())
    }
}

/// Synthesize a value for one unprotected field.
///
/// Hint candidates are fitted to the field (digits only for numeric fields,
/// truncated to capacity); a hint that fits to nothing falls through to
/// random generation. Returns an empty string only for zero-capacity
/// fields.
pub fn generate_value(
    rng: &mut StdRng,
    field: &Field,
    screen_width: usize,
    max_field_length: usize,
    pools: &HintPools,
    prefer_transaction: bool,
) -> String {
    let capacity = field.capacity(screen_width).min(max_field_length.max(1));
    if capacity == 0 {
        return String::new();
    }

    if let Some(candidate) = pools.pick(rng, prefer_transaction) {
        let fitted = fit_candidate(candidate, field.is_numeric(), capacity);
        if !fitted.is_empty() {
            return fitted;
        }
    }

    random_value(rng, field.is_numeric(), capacity)
}

/// Clip a hint to what the field accepts.
fn fit_candidate(candidate: &str, numeric: bool, capacity: usize) -> String {
    let filtered: String = if numeric {
        candidate.chars().filter(char::is_ascii_digit).collect()
    } else {
        candidate.to_string()
    };
    filtered.chars().take(capacity).collect()
}

/// A random value filling the field's capacity.
fn random_value(rng: &mut StdRng, numeric: bool, capacity: usize) -> String {
    let alphabet = if numeric { DIGITS } else { ALPHABET };
    (0..capacity)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    fn input_field(width: usize) -> Field {
        Field::new(1, 0, width, 0, 0x00, 0, 0)
    }

    fn numeric_field(width: usize) -> Field {
        Field::new(1, 0, width, 0, 0x10, 0, 0)
    }

    #[test]
    fn test_pools_normalize_and_dedupe() {
        let hints = vec![
            ChaosHint {
                transaction: " CICS ".to_string(),
                known_data: vec!["alpha".to_string(), String::new(), " alpha ".to_string()],
            },
            ChaosHint {
                transaction: "CICS".to_string(),
                known_data: vec!["beta".to_string()],
            },
            ChaosHint::default(),
        ];
        let pools = HintPools::from_hints(&hints);
        assert_eq!(pools.transactions, vec!["CICS"]);
        assert_eq!(pools.known_data, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_random_value_respects_capacity_and_alphabet() {
        let mut rng = rng();
        let field = input_field(5);
        let pools = HintPools::default();
        let value = generate_value(&mut rng, &field, 80, 40, &pools, true);
        assert_eq!(value.chars().count(), 5);
        assert!(value
            .bytes()
            .all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_numeric_field_gets_digits_only() {
        let mut rng = rng();
        let field = numeric_field(8);
        let pools = HintPools::default();
        let value = generate_value(&mut rng, &field, 80, 40, &pools, false);
        assert_eq!(value.len(), 8);
        assert!(value.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_max_field_length_clamps_capacity() {
        let mut rng = rng();
        let field = input_field(60);
        let pools = HintPools::default();
        let value = generate_value(&mut rng, &field, 80, 40, &pools, false);
        assert_eq!(value.chars().count(), 40);
    }

    #[test]
    fn test_hint_is_truncated_to_capacity() {
        let mut rng = rng();
        let field = input_field(4);
        let pools = HintPools::from_hints(&[ChaosHint {
            transaction: "LONGTRANSACTION".to_string(),
            known_data: vec![],
        }]);
        let value = generate_value(&mut rng, &field, 80, 40, &pools, true);
        assert_eq!(value, "LONG");
    }

    #[test]
    fn test_numeric_hint_strips_non_digits() {
        let mut rng = rng();
        let field = numeric_field(6);
        let pools = HintPools::from_hints(&[ChaosHint {
            transaction: String::new(),
            known_data: vec!["AB12C3".to_string()],
        }]);
        let value = generate_value(&mut rng, &field, 80, 40, &pools, false);
        assert_eq!(value, "123");
    }

    #[test]
    fn test_all_symbol_hint_falls_back_to_random_digits() {
        let mut rng = rng();
        let field = numeric_field(4);
        let pools = HintPools::from_hints(&[ChaosHint {
            transaction: String::new(),
            known_data: vec!["----".to_string()],
        }]);
        let value = generate_value(&mut rng, &field, 80, 40, &pools, false);
        assert_eq!(value.len(), 4);
        assert!(value.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_first_field_draws_transactions_with_bias() {
        let mut rng = rng();
        let pools = HintPools::from_hints(&[ChaosHint {
            transaction: "TXN1".to_string(),
            known_data: vec!["DATA".to_string()],
        }]);
        let mut transaction_draws = 0;
        for _ in 0..200 {
            if pools.pick(&mut rng, true) == Some("TXN1") {
                transaction_draws += 1;
            }
        }
        // Expectation is 150 of 200; allow a generous band.
        assert!((110..=190).contains(&transaction_draws));

        // Non-first fields never draw transactions while data exists.
        for _ in 0..50 {
            assert_eq!(pools.pick(&mut rng, false), Some("DATA"));
        }
    }

    #[test]
    fn test_later_fields_fall_back_to_transactions_without_data() {
        let mut rng = rng();
        let pools = HintPools::from_hints(&[ChaosHint {
            transaction: "ONLY".to_string(),
            known_data: vec![],
        }]);
        assert_eq!(pools.pick(&mut rng, false), Some("ONLY"));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let field = input_field(10);
        let pools = HintPools::default();
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(
            generate_value(&mut a, &field, 80, 40, &pools, true),
            generate_value(&mut b, &field, 80, 40, &pools, true)
        );
    }
}
