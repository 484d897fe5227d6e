//! Key pattern matching for `keys_matching`.
//!
//! `*` matches zero or more characters; every other character matches itself.

/// Returns true if `text` matches the glob `pattern`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            // Let the last star swallow one more character
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, t));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal() {
        assert!(glob_match("orders:42", "orders:42"));
        assert!(!glob_match("orders:42", "orders:421"));
        assert!(!glob_match("orders:42", "orders:4"));
    }

    #[test]
    fn test_star_matches_any_run() {
        assert!(glob_match("orders:*", "orders:42"));
        assert!(glob_match("orders:*", "orders:"));
        assert!(glob_match("*:42", "profiles:42"));
        assert!(glob_match("user:*:orders", "user:7:orders"));
        assert!(!glob_match("user:*:orders", "user:7:profile"));
        assert!(glob_match("*", ""));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
    }

    #[test]
    fn test_other_regex_characters_are_literal() {
        assert!(glob_match("a.b", "a.b"));
        assert!(!glob_match("a.b", "axb"));
        assert!(glob_match("price?[1]", "price?[1]"));
        assert!(!glob_match("price?", "prices"));
    }
}
