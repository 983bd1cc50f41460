//! URL-safe identifier generation.
//!
//! A slug is derived deterministically from an item's title; collisions
//! with existing slugs are resolved by appending the current epoch time in
//! milliseconds.  The suffix is probabilistic, not proven unique – the
//! UNIQUE index on `items.slug` is the backstop, and the create path
//! retries once on a constraint violation.

use chrono::Utc;

/// Lowercase `title` and reduce it to `[a-z0-9]` runs joined by single
/// hyphens.  Deterministic; returns an empty string if the title contains
/// no alphanumeric characters at all.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Append a `-{unix_millis}` suffix when `exists` reports the candidate
/// as taken.  Single retry only; suffix entropy makes a second collision
/// vanishingly unlikely under realistic creation rates.
pub fn with_collision_suffix(candidate: &str, exists: bool) -> String {
    if exists {
        format!("{candidate}-{}", Utc::now().timestamp_millis())
    } else {
        candidate.to_owned()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slugify_lowercases_and_joins() {
        assert_eq!(slugify("Epic Sword Mod"), "epic-sword-mod");
    }

    #[test]
    fn slugify_collapses_separator_runs() {
        assert_eq!(slugify("Epic   Sword -- Mod!!"), "epic-sword-mod");
        assert_eq!(slugify("  Shader_Pack v2  "), "shader-pack-v2");
    }

    #[test]
    fn slugify_is_deterministic_and_url_safe() {
        let titles = ["Epic Sword Mod!!", "Crème Brûlée Pack", "RTX/Shaders (1.20)"];
        for title in titles {
            let a = slugify(title);
            let b = slugify(title);
            assert_eq!(a, b);
            assert!(a
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!a.starts_with('-') && !a.ends_with('-'));
        }
    }

    #[test]
    fn slugify_symbol_only_title_is_empty() {
        assert_eq!(slugify("!!! ???"), "");
    }

    #[test]
    fn collision_suffix_fires_only_on_collision() {
        assert_eq!(with_collision_suffix("epic-sword-mod", false), "epic-sword-mod");

        let suffixed = with_collision_suffix("epic-sword-mod", true);
        assert!(suffixed.starts_with("epic-sword-mod-"));
        let suffix = &suffixed["epic-sword-mod-".len()..];
        assert!(!suffix.is_empty());
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }
}
