use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("Digit count must be between {min} and {max}, got {actual}")]
    DigitCountOutOfRange { min: usize, max: usize, actual: usize },
    #[error("{kind} is required")]
    Empty { kind: CodeKind },
    #[error("{kind} must be {expected} digits, got {actual}")]
    WrongLength {
        kind: CodeKind,
        expected: usize,
        actual: usize,
    },
    #[error("{kind} must contain only numbers")]
    NonDigit { kind: CodeKind },
    #[error("{kind} cannot have duplicate digits")]
    RepeatedDigit { kind: CodeKind },
}

/// Which kind of code is being checked, for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CodeKind {
    Secret,
    Guess,
}

/// Format rules shared by secrets and guesses.
///
/// Repeated digits are allowed only for the digit counts listed in `duplicate_digit_counts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRules {
    pub min_digits: usize,
    pub max_digits: usize,
    pub duplicate_digit_counts: BTreeSet<usize>,
}

impl Default for CodeRules {
    fn default() -> Self {
        Self {
            min_digits: 3,
            max_digits: 6,
            duplicate_digit_counts: BTreeSet::new(),
        }
    }
}

impl CodeRules {
    pub fn check_digit_count(&self, count: usize) -> Result<(), CodeError> {
        if count < self.min_digits || count > self.max_digits {
            return Err(CodeError::DigitCountOutOfRange {
                min: self.min_digits,
                max: self.max_digits,
                actual: count,
            });
        }
        Ok(())
    }

    pub fn allows_duplicates(&self, digit_count: usize) -> bool {
        self.duplicate_digit_counts.contains(&digit_count)
    }

    pub fn check_secret(&self, secret: &str, digit_count: usize) -> Result<(), CodeError> {
        self.check_code(CodeKind::Secret, secret, digit_count)
    }

    pub fn check_guess(&self, guess: &str, digit_count: usize) -> Result<(), CodeError> {
        self.check_code(CodeKind::Guess, guess, digit_count)
    }

    fn check_code(&self, kind: CodeKind, code: &str, digit_count: usize) -> Result<(), CodeError> {
        if code.is_empty() {
            return Err(CodeError::Empty { kind });
        }
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::NonDigit { kind });
        }
        // all bytes are ASCII from here, so byte length is the digit count
        if code.len() != digit_count {
            return Err(CodeError::WrongLength {
                kind,
                expected: digit_count,
                actual: code.len(),
            });
        }
        if !self.allows_duplicates(digit_count) {
            let distinct: BTreeSet<u8> = code.bytes().collect();
            if distinct.len() != code.len() {
                return Err(CodeError::RepeatedDigit { kind });
            }
        }
        Ok(())
    }
}
