//! Fixed locations in the backing and asset stores.

/// Default collection root holding one child per user record.
pub const USERS_ROOT: &str = "Users";

/// Asset-store prefix under which profile images are kept.
pub const IMAGES_PREFIX: &str = "images";

/// Characters a top-level key may not contain.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Asset path of the profile image for record `id`: `images/{id}`.
#[must_use]
pub fn image_path(id: &str) -> String {
    format!("{IMAGES_PREFIX}/{id}")
}

/// Returns why `key` cannot name a top-level entry, or `None` if it can.
#[must_use]
pub fn key_violation(key: &str) -> Option<&'static str> {
    if key.trim().is_empty() {
        Some("key is empty")
    } else if key.contains(FORBIDDEN_KEY_CHARS) {
        Some("key contains one of / . # $ [ ]")
    } else if key.chars().any(char::is_control) {
        Some("key contains control characters")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_path_uses_prefix() {
        assert_eq!(image_path("u1"), "images/u1");
    }

    #[test]
    fn valid_keys() {
        assert_eq!(key_violation("u1"), None);
        assert_eq!(key_violation("-NqzX_4abc"), None);
    }

    #[test]
    fn invalid_keys() {
        assert!(key_violation("").is_some());
        assert!(key_violation("   ").is_some());
        assert!(key_violation("a/b").is_some());
        assert!(key_violation("a.b").is_some());
        assert!(key_violation("a[0]").is_some());
        assert!(key_violation("a\nb").is_some());
    }
}
