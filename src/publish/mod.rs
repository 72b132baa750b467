//! Publish adapters, one per destination platform, plus the shared
//! title/caption helpers.

pub mod instagram;
pub mod youtube;

pub use instagram::InstagramPublisher;
pub use youtube::YouTubePublisher;

use std::sync::OnceLock;

use regex::Regex;

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip URLs and collapse whitespace from source text. If nothing remains,
/// fall back to an author-based caption.
pub fn clean_caption(text: &str, author: &str) -> String {
    let stripped = url_re().replace_all(text, "");
    let cleaned = whitespace_re()
        .replace_all(stripped.trim(), " ")
        .trim()
        .to_string();
    if !cleaned.is_empty() {
        return cleaned;
    }
    if !author.is_empty() {
        return format!("Video by {author}");
    }
    "Check out this video!".to_string()
}

/// A title fit for destinations with a length cap, derived from the caption.
pub fn make_title(text: &str, author: &str, max_len: usize) -> String {
    let clean = clean_caption(text, author);
    if clean.chars().count() > max_len {
        let truncated: String = clean.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    } else {
        clean
    }
}

/// Clamp to a destination's character limit without splitting a char.
pub(crate) fn clamp_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_urls_and_collapses_whitespace() {
        assert_eq!(
            clean_caption("Check this out!   https://t.co/xyz", "@author"),
            "Check this out!"
        );
        assert_eq!(
            clean_caption("one\n\ntwo   three https://x.com/a", ""),
            "one two three"
        );
    }

    #[test]
    fn url_only_text_falls_back_to_author() {
        assert_eq!(clean_caption("https://t.co/abc123", "@user"), "Video by @user");
        assert_eq!(clean_caption("", ""), "Check out this video!");
    }

    #[test]
    fn long_titles_are_truncated_with_ellipsis() {
        let text = "a".repeat(150);
        let title = make_title(&text, "", 100);
        assert_eq!(title.chars().count(), 100);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn short_titles_pass_through() {
        assert_eq!(make_title("Great content", "", 100), "Great content");
    }
}
