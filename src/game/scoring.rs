// Bulls and Cows scoring. A digit slot on either side is consumed at most once, so repeated
// digits in the guess or the secret are never double counted.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub bulls: usize,
    pub cows: usize,
}

impl Score {
    /// A guess wins when every position is a bull
    pub fn is_win(&self, code_length: usize) -> bool {
        code_length > 0 && self.bulls == code_length
    }
}

/// Scores `guess` against `secret`.
///
/// Both are expected to be equal-length digit strings; format checks belong to the caller.
/// Bulls are counted in a first pass and mark both slots as consumed. Cows are counted in a
/// second pass where each remaining guess digit takes the left-most unconsumed matching digit
/// of the secret.
pub fn score(guess: &str, secret: &str) -> Score {
    let guess = guess.as_bytes();
    let secret = secret.as_bytes();

    let mut guess_used = vec![false; guess.len()];
    let mut secret_used = vec![false; secret.len()];

    let mut bulls = 0;
    for (i, (g, s)) in guess.iter().zip(secret.iter()).enumerate() {
        if g == s {
            bulls += 1;
            guess_used[i] = true;
            secret_used[i] = true;
        }
    }

    let mut cows = 0;
    for (i, g) in guess.iter().enumerate() {
        if guess_used[i] {
            continue;
        }
        let matching_slot = secret
            .iter()
            .enumerate()
            .position(|(j, s)| !secret_used[j] && s == g);
        if let Some(j) = matching_slot {
            cows += 1;
            secret_used[j] = true;
        }
    }

    Score { bulls, cows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1234", "1234", 4, 0)]
    #[case("1234", "4321", 0, 4)]
    #[case("1234", "5678", 0, 0)]
    #[case("1243", "1234", 2, 2)]
    #[case("5671", "1234", 0, 1)]
    #[case("123", "132", 1, 2)]
    #[case("987654", "987645", 4, 2)]
    fn test_unique_digit_scores(
        #[case] guess: &str,
        #[case] secret: &str,
        #[case] bulls: usize,
        #[case] cows: usize,
    ) {
        assert_eq!(score(guess, secret), Score { bulls, cows });
    }

    #[rstest]
    #[case("1123", "1111", 2, 0)] // only the two aligned 1s count
    #[case("1111", "1123", 2, 0)]
    #[case("1122", "2211", 0, 4)]
    #[case("1122", "1212", 2, 2)]
    #[case("1000", "0001", 2, 2)] // middle zeros are bulls, the outer pair swaps
    #[case("2211", "1000", 0, 1)] // a single secret 1 can only be used once
    #[case("00", "00", 2, 0)]
    fn test_repeated_digit_scores(
        #[case] guess: &str,
        #[case] secret: &str,
        #[case] bulls: usize,
        #[case] cows: usize,
    ) {
        assert_eq!(score(guess, secret), Score { bulls, cows });
    }

    #[test]
    fn test_total_never_exceeds_length() {
        let codes = ["0000", "0011", "0123", "1100", "1230", "3210", "9999", "0909"];
        for guess in codes {
            for secret in codes {
                let result = score(guess, secret);
                assert!(
                    result.bulls + result.cows <= 4,
                    "{} vs {} gave {:?}",
                    guess,
                    secret,
                    result
                );
            }
            assert_eq!(score(guess, guess).bulls, 4);
        }
    }

    #[test]
    fn test_permuting_non_bull_digits_keeps_bulls() {
        // secret 1234 against guess 1 5 6 7: only position 0 is a bull
        let guess = "1567";
        let base = score(guess, "1234");
        for secret in ["1342", "1423", "1324", "1243", "1432"] {
            assert_eq!(score(guess, secret).bulls, base.bulls);
        }
    }

    #[test]
    fn test_is_win() {
        assert!(score("5678", "5678").is_win(4));
        assert!(!score("5687", "5678").is_win(4));
        assert!(!Score { bulls: 0, cows: 0 }.is_win(0));
    }
}
