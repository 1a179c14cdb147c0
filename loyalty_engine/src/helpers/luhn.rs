//! # Order number validation
//!
//! Order numbers are validated with the Luhn checksum. Reading the digits right-to-left, every second digit (starting
//! from the second-from-rightmost) is doubled, and 9 is subtracted from any doubled value that exceeds 9. The number is
//! valid if the sum of all the digits is divisible by 10.

/// Returns true if `number` is a non-empty string of ASCII digits with a valid Luhn checksum.
///
/// Any other character, including whitespace and signs, makes the number invalid.
pub fn is_valid_order_number(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in number.bytes().rev().enumerate() {
        if !c.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(c - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// Calculates the digit that, appended to `payload`, produces a valid order number.
///
/// Returns `None` if `payload` contains anything other than ASCII digits.
pub fn luhn_check_digit(payload: &str) -> Option<char> {
    let mut sum = 0u32;
    for (i, c) in payload.bytes().rev().enumerate() {
        if !c.is_ascii_digit() {
            return None;
        }
        let mut digit = u32::from(c - b'0');
        // The check digit will occupy position 0, so the payload's rightmost digit is doubled
        if i % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    let check = (10 - sum % 10) % 10;
    char::from_digit(check, 10)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_numbers() {
        assert!(is_valid_order_number("79927398713"));
        assert!(!is_valid_order_number("79927398710"));
        assert!(is_valid_order_number("12345678903"));
        assert!(is_valid_order_number("9278923470"));
        assert!(is_valid_order_number("2377225624"));
        assert!(is_valid_order_number("0"));
        assert!(!is_valid_order_number("1"));
    }

    #[test]
    fn rejects_non_digits() {
        assert!(!is_valid_order_number(""));
        assert!(!is_valid_order_number("abc"));
        assert!(!is_valid_order_number("7992 7398 713"));
        assert!(!is_valid_order_number("-79927398713"));
        assert!(!is_valid_order_number("79927398713\n"));
        assert!(!is_valid_order_number("７９"));
    }

    #[test]
    fn single_digit_mutations_are_detected() {
        let valid = "79927398713";
        for pos in 0..valid.len() {
            let original = valid.as_bytes()[pos];
            for replacement in b'0'..=b'9' {
                if replacement == original {
                    continue;
                }
                let mut mutated = valid.as_bytes().to_vec();
                mutated[pos] = replacement;
                let mutated = String::from_utf8(mutated).unwrap();
                assert!(!is_valid_order_number(&mutated), "{mutated} should be invalid");
            }
        }
    }

    #[test]
    fn check_digit_completes_payload() {
        assert_eq!(luhn_check_digit("7992739871"), Some('3'));
        assert_eq!(luhn_check_digit("1234567890"), Some('3'));
        assert_eq!(luhn_check_digit("12a"), None);
        for payload in ["1", "42", "100000", "31415926535", "999999999999"] {
            let digit = luhn_check_digit(payload).unwrap();
            let number = format!("{payload}{digit}");
            assert!(is_valid_order_number(&number), "{number} should be valid");
        }
    }
}
