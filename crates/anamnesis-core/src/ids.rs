// ABOUTME: Typed-prefix id generation for persisted entities.
// ABOUTME: Mirrors services/type_converters.py:generate_id from the source implementation.

use uuid::Uuid;

/// Generate a unique id with an optional type prefix, e.g. `concept_3f9a2c1b0d4e`.
pub fn generate_id(prefix: &str) -> String {
    let uid = Uuid::new_v4().simple().to_string();
    let short = &uid[..12];
    if prefix.is_empty() {
        short.to_string()
    } else {
        format!("{prefix}_{short}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_ids_carry_the_prefix() {
        let id = generate_id("concept");
        assert!(id.starts_with("concept_"));
        assert_eq!(id.len(), "concept_".len() + 12);
    }

    #[test]
    fn unprefixed_ids_are_bare() {
        let id = generate_id("");
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn ids_are_unique() {
        let a = generate_id("pattern");
        let b = generate_id("pattern");
        assert_ne!(a, b);
    }
}
