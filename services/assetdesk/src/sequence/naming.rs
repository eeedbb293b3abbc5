//! Username and initial-password derivation.
use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Base username: the first name plus the first letter of every last-name token, lowercased.
///
/// Only ASCII letters are kept, so a base never ends in a digit and cannot be mistaken for a
/// postfixed name. Returns `None` when nothing usable remains of the first name.
///
/// ```
/// use assetdesk::sequence::naming::base_username;
///
/// assert_eq!(base_username("John", "Doe").as_deref(), Some("johnd"));
/// assert_eq!(base_username("Binh", "Nguyen Van").as_deref(), Some("binhnv"));
/// ```
pub fn base_username(first_name: &str, last_name: &str) -> Option<String> {
    let mut base: String = first_name
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if base.is_empty() {
        return None;
    }
    for token in last_name.split_whitespace() {
        if let Some(initial) = token.chars().find(char::is_ascii_alphabetic) {
            base.push(initial.to_ascii_lowercase());
        }
    }
    Some(base)
}

/// Strip the numeric postfix a generated username may carry.
pub fn strip_postfix(username: &str) -> &str {
    username.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Bit offset of `base` in the presence bitmap.
pub fn presence_offset(base: &str, bitmap_bits: u32) -> u32 {
    let digest = Sha256::digest(base.as_bytes());
    let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    word % bitmap_bits.max(1)
}

/// Password handed to a new user: `username@ddMMyyyy` of the date of birth.
pub fn initial_password(username: &str, date_of_birth: NaiveDate) -> String {
    format!("{username}@{}", date_of_birth.format("%d%m%Y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_username_drops_spaces_and_symbols() {
        assert_eq!(base_username(" Mary Ann ", "O'Neil").as_deref(), Some("maryanno"));
        assert_eq!(base_username("Le", "Tran  Thi   Mai").as_deref(), Some("lettm"));
        assert_eq!(base_username("  ", "Doe"), None);
    }

    #[test]
    fn digits_never_enter_the_base() {
        assert_eq!(base_username("Jo", "Doe 2").as_deref(), Some("jod"));
        assert_eq!(base_username("Anna2", "Le").as_deref(), Some("annal"));
        assert_eq!(base_username("Jo", "Doe 3rd").as_deref(), Some("jodr"));
        assert_eq!(base_username("42", "Doe"), None);
        for (first, last) in [("Jo", "Doe 2"), ("R2", "D2"), ("Le", "Tran 7 Mai")] {
            let base = base_username(first, last).expect("base");
            assert_eq!(strip_postfix(&base), base);
        }
    }

    #[test]
    fn strip_postfix_removes_trailing_digits_only() {
        assert_eq!(strip_postfix("johnd12"), "johnd");
        assert_eq!(strip_postfix("johnd"), "johnd");
    }

    #[test]
    fn presence_offset_is_stable_and_bounded() {
        let a = presence_offset("johnd", 1024);
        assert_eq!(a, presence_offset("johnd", 1024));
        assert!(a < 1024);
        assert_eq!(presence_offset("johnd", 0), 0);
    }

    #[test]
    fn initial_password_uses_day_month_year() {
        let dob = NaiveDate::from_ymd_opt(1995, 4, 2).expect("date");
        assert_eq!(initial_password("johnd", dob), "johnd@02041995");
    }
}
