//! Name validation for forward references.

use crate::{ForwardError, ForwardResult};
use once_cell::sync::Lazy;
use regex_lite::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[_A-Za-z][_A-Za-z0-9]*$").expect("identifier pattern is a valid regex")
});

/// Returns true if `name` can name a forward reference.
pub fn is_legal_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

pub(crate) fn ensure_legal(name: &str) -> ForwardResult<()> {
    if is_legal_identifier(name) {
        Ok(())
    } else {
        Err(ForwardError::illegal_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_legal_identifier("foo"));
        assert!(is_legal_identifier("_private"));
        assert!(is_legal_identifier("Node2"));

        assert!(!is_legal_identifier(""));
        assert!(!is_legal_identifier("2fast"));
        assert!(!is_legal_identifier("howdy there"));
        assert!(!is_legal_identifier("a.b"));
    }
}
