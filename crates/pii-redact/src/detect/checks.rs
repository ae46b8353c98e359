//! Format validators used as confidence refinements.

use regex::Regex;
use std::sync::LazyLock;

static SSN_GROUPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{3})-?(\d{2})-?(\d{4})\b").expect("SSN group pattern is a valid regex")
});

/// Validate a credit card number using the Luhn algorithm.
#[must_use]
pub fn luhn_check(number: &str) -> bool {
    let digits: Vec<u32> = number
        .chars()
        .filter(char::is_ascii_digit)
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Check that an SSN is outside the known-invalid ranges.
#[must_use]
pub fn ssn_range_valid(ssn: &str) -> bool {
    if let Some(caps) = SSN_GROUPS.captures(ssn) {
        let area: u16 = caps[1].parse().unwrap_or(0);
        let group: u16 = caps[2].parse().unwrap_or(0);
        let serial: u16 = caps[3].parse().unwrap_or(0);

        // Area 000, 666 and 900+ are never issued.
        if area == 0 || area == 666 || area >= 900 {
            return false;
        }
        if group == 0 || serial == 0 {
            return false;
        }
        true
    } else {
        false
    }
}
