//! Argument Template Keys
//!
//! Job arguments reference their variables with HTCondor macro syntax,
//! e.g. `arguments = $(lr) --seed $(seed)`.

use super::assignment::Key;

/// Extracts the ordered, de-duplicated keys referenced by a template.
///
/// # Example
/// ```
/// use dagweaver::params::template::extract_keys;
///
/// let keys = extract_keys("$(lr) --seed $(seed) --again $(lr)");
/// assert_eq!(keys, vec!["lr", "seed"]);
/// ```
pub fn extract_keys(template: &str) -> Vec<Key> {
    let mut keys: Vec<Key> = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'(') {
            continue;
        }
        chars.next();

        let mut name = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == ')' {
                closed = true;
                break;
            }
            name.push(inner);
        }

        if closed && !name.is_empty() && !keys.contains(&name) {
            keys.push(name);
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_keys_in_order() {
        let keys = extract_keys("python train.py --lr $(lr) --bs $(batch_size) $(seed)");
        assert_eq!(keys, vec!["lr", "batch_size", "seed"]);
    }

    #[test]
    fn test_extract_keys_ignores_plain_parens_and_unclosed() {
        assert!(extract_keys("echo (hello) $ x").is_empty());
        assert!(extract_keys("run $(open").is_empty());
        assert!(extract_keys("$()").is_empty());
    }
}
