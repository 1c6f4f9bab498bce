/// checks that the string has no control characters, no leading or trailing
/// whitespace and optionally no more than `max_chars` characters
pub fn check_control_leading_trailing<G>(
    given: G,
    max_chars: Option<usize>
) -> bool
where
    G: AsRef<str>
{
    let given_ref = given.as_ref();

    if given_ref.starts_with(char::is_whitespace) || given_ref.ends_with(char::is_whitespace) {
        return false;
    }

    check_chars(given_ref, max_chars, |ch| ch.is_control())
}

/// checks that the string contains no control or whitespace characters and
/// optionally no more than `max_chars` characters
pub fn check_control_whitespace<G>(
    given: G,
    max_chars: Option<usize>
) -> bool
where
    G: AsRef<str>
{
    check_chars(given.as_ref(), max_chars, |ch| ch.is_control() || ch.is_whitespace())
}

fn check_chars<F>(given: &str, max_chars: Option<usize>, reject: F) -> bool
where
    F: Fn(char) -> bool
{
    let mut char_count = 0;

    for ch in given.chars() {
        if reject(ch) {
            return false;
        }

        char_count += 1;

        if let Some(max) = max_chars {
            if char_count > max {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    pub fn leading_trailing_whitespace_chars() {
        assert!(!check_control_leading_trailing(" test", None), "leading whitespace characters");
        assert!(!check_control_leading_trailing("test ", None), "trailing whitespace characters");
        assert!(check_control_leading_trailing("test test", None), "contained whitespace characters");
    }

    #[test]
    pub fn leading_trailing_control_chars() {
        assert!(!check_control_leading_trailing("test\u{0000}", None), "trailing control characters");
        assert!(!check_control_leading_trailing("\u{0000}test", None), "leading control characters");
        assert!(!check_control_leading_trailing("test\u{0000}test", None), "contains control characters");
    }

    #[test]
    pub fn max_length() {
        let k = String::from("abcdefghijklmnopqrstuvwxyzA");
        let count = k.chars().count();

        assert!(!check_control_leading_trailing(&k, Some(count - 1)), "max {} total {}", count - 1, count);
        assert!(!check_control_whitespace(&k, Some(count - 1)), "max {} total {}", count - 1, count);
        assert!(check_control_whitespace(&k, Some(count)), "max {count} total {count}");
    }

    #[test]
    pub fn whitespace_chars() {
        assert!(!check_control_whitespace(" test", None), "leading whitespace characters");
        assert!(!check_control_whitespace("test test", None), "contains whitespace characters");
        assert!(!check_control_whitespace("test\u{0000}", None), "trailing control characters");
    }
}
