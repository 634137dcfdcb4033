//! Small helpers shared by the tally crates: runtime id counters and
//! HTML text handling.

use std::sync::atomic::{AtomicUsize, Ordering};

// Global counters for runtime ID generation
static RUNTIME_MOUNT_COUNTER: AtomicUsize = AtomicUsize::new(0);
static RUNTIME_LISTENER_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Next id for a mounted view.
pub fn next_mount_counter() -> usize {
    RUNTIME_MOUNT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Next id for a cache listener.
pub fn next_listener_counter() -> usize {
    RUNTIME_LISTENER_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Escape text for use inside HTML element content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse of [`escape_html`] for the entities it produces.
pub fn unescape_html(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Drop every `<...>` tag and collapse runs of whitespace, leaving the text a
/// browser would display.
pub fn strip_tags(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;

    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    unescape_html(&collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_round_trips_special_characters() {
        let raw = r#"<a href="x">Tom & 'Jerry'</a>"#;
        let escaped = escape_html(raw);

        assert_eq!(
            escaped,
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(unescape_html(&escaped), raw);
    }

    #[test]
    fn strip_tags_keeps_visible_text() {
        let markup = "<div>\n  Count: <span class=\"bold\">3</span>\n</div>";
        assert_eq!(strip_tags(markup), "Count: 3");
    }

    #[test]
    fn strip_tags_unescapes_entities() {
        assert_eq!(strip_tags("<p>1 &lt; 2</p>"), "1 < 2");
    }

    #[test]
    fn counters_advance_independently() {
        let mount = next_mount_counter();
        let listener = next_listener_counter();
        assert!(next_mount_counter() > mount);
        assert!(next_listener_counter() > listener);
    }
}
