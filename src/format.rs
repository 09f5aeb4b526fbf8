//! Stateless format detection and rendering (spec §4.3).
//!
//! `detect_content_type` classifies outbound text as plain, markdown, or
//! code via an escape-aware marker scan. `markdown_to_html` renders a
//! pragmatic subset to HTML; `strip_formatting` emits the same traversal's
//! textual content only. Grounded on the reference Telegram adapter's
//! `markdown_to_telegram_html`/cached `MarkdownPatterns`, generalised into
//! a channel-independent module per this system's contract.

use std::sync::OnceLock;

use regex::Regex;

/// Outcome of [`detect_content_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// No markdown or code markers found.
    Plain,
    /// At least one fenced or inline code marker found.
    Code,
    /// Markdown emphasis/link markers found, no code markers.
    Markdown,
}

struct Patterns {
    code_block: Regex,
    code_inline: Regex,
    bold_asterisk: Regex,
    bold_underscore: Regex,
    italic_asterisk: Regex,
    italic_underscore: Regex,
    strikethrough: Regex,
    link: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        code_block: Regex::new(r"(?s)```\w*\n?(.*?)```").unwrap(),
        code_inline: Regex::new(r"`([^`]+)`").unwrap(),
        bold_asterisk: Regex::new(r"\*\*(.+?)\*\*").unwrap(),
        bold_underscore: Regex::new(r"__(.+?)__").unwrap(),
        italic_asterisk: Regex::new(r"\*([^*\n]+)\*").unwrap(),
        italic_underscore: Regex::new(r"_([^_\n]+)_").unwrap(),
        strikethrough: Regex::new(r"~~(.+?)~~").unwrap(),
        link: Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap(),
    })
}

/// Count of immediately-preceding backslashes at byte offset `idx` in
/// `chars`; an odd count means the character at `idx` is escaped.
fn is_escaped(chars: &[char], idx: usize) -> bool {
    let mut count = 0usize;
    let mut i = idx;
    while i > 0 {
        i -= 1;
        if chars[i] == '\\' {
            count += 1;
        } else {
            break;
        }
    }
    count % 2 == 1
}

/// Classify `text` per spec §4.3: unescaped backtick → Code; else
/// unescaped `**`/`__`/`~~` or a lone unescaped `*`/`_`/`[`/`~` → Markdown;
/// else Plain.
#[must_use]
pub fn detect_content_type(text: &str) -> ContentType {
    let chars: Vec<char> = text.chars().collect();
    let mut has_code = false;
    let mut has_markdown = false;

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '`' => {
                if !is_escaped(&chars, i) {
                    has_code = true;
                }
                i += 1;
            }
            c @ ('*' | '_' | '~') if chars.get(i + 1) == Some(&c) => {
                if !is_escaped(&chars, i) {
                    has_markdown = true;
                }
                i += 2;
            }
            '*' | '_' | '[' | '~' => {
                if !is_escaped(&chars, i) {
                    has_markdown = true;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    if has_code {
        ContentType::Code
    } else if has_markdown {
        ContentType::Markdown
    } else {
        ContentType::Plain
    }
}

/// HTML-escape `<`, `>`, `&`, `"`, `'` only (spec §4.3).
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Render a pragmatic markdown subset to HTML. Unclosed markers pass
/// through literally (the regexes simply do not match them).
#[must_use]
pub fn markdown_to_html(text: &str) -> String {
    let p = patterns();
    let escaped = escape_html(text);

    let with_code_blocks = p
        .code_block
        .replace_all(&escaped, |caps: &regex::Captures<'_>| format!("<pre><code>{}</code></pre>", &caps[1]));
    let with_code_inline = p
        .code_inline
        .replace_all(&with_code_blocks, |caps: &regex::Captures<'_>| format!("<code>{}</code>", &caps[1]));
    let with_bold_asterisk = p
        .bold_asterisk
        .replace_all(&with_code_inline, |caps: &regex::Captures<'_>| format!("<b>{}</b>", &caps[1]));
    let with_bold_underscore = p
        .bold_underscore
        .replace_all(&with_bold_asterisk, |caps: &regex::Captures<'_>| format!("<b>{}</b>", &caps[1]));
    let with_italic_asterisk = p
        .italic_asterisk
        .replace_all(&with_bold_underscore, |caps: &regex::Captures<'_>| format!("<i>{}</i>", &caps[1]));
    let with_italic_underscore = p
        .italic_underscore
        .replace_all(&with_italic_asterisk, |caps: &regex::Captures<'_>| format!("<i>{}</i>", &caps[1]));
    let with_strikethrough = p
        .strikethrough
        .replace_all(&with_italic_underscore, |caps: &regex::Captures<'_>| format!("<s>{}</s>", &caps[1]));
    let with_links = p
        .link
        .replace_all(&with_strikethrough, |caps: &regex::Captures<'_>| {
            format!("<a href=\"{}\">{}</a>", &caps[2], &caps[1])
        });

    with_links.into_owned()
}

/// Same traversal as [`markdown_to_html`] but emits only textual content,
/// with no HTML escaping.
#[must_use]
pub fn strip_formatting(text: &str) -> String {
    let p = patterns();

    let with_code_blocks = p
        .code_block
        .replace_all(text, |caps: &regex::Captures<'_>| caps[1].to_string());
    let with_code_inline = p
        .code_inline
        .replace_all(&with_code_blocks, |caps: &regex::Captures<'_>| caps[1].to_string());
    let with_bold_asterisk = p
        .bold_asterisk
        .replace_all(&with_code_inline, |caps: &regex::Captures<'_>| caps[1].to_string());
    let with_bold_underscore = p
        .bold_underscore
        .replace_all(&with_bold_asterisk, |caps: &regex::Captures<'_>| caps[1].to_string());
    let with_italic_asterisk = p
        .italic_asterisk
        .replace_all(&with_bold_underscore, |caps: &regex::Captures<'_>| caps[1].to_string());
    let with_italic_underscore = p
        .italic_underscore
        .replace_all(&with_italic_asterisk, |caps: &regex::Captures<'_>| caps[1].to_string());
    let with_strikethrough = p
        .strikethrough
        .replace_all(&with_italic_underscore, |caps: &regex::Captures<'_>| caps[1].to_string());
    let with_links = p
        .link
        .replace_all(&with_strikethrough, |caps: &regex::Captures<'_>| caps[1].to_string());

    with_links.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_plain() {
        assert_eq!(detect_content_type("hello world"), ContentType::Plain);
    }

    #[test]
    fn test_detect_code_backtick() {
        assert_eq!(detect_content_type("use `cargo build`"), ContentType::Code);
        assert_eq!(detect_content_type("```rust\nfn main() {}\n```"), ContentType::Code);
    }

    #[test]
    fn test_detect_markdown() {
        assert_eq!(detect_content_type("**bold**"), ContentType::Markdown);
        assert_eq!(detect_content_type("a *word* here"), ContentType::Markdown);
        assert_eq!(detect_content_type("[link](http://x)"), ContentType::Markdown);
    }

    #[test]
    fn test_escaped_marker_is_not_markdown() {
        assert_eq!(detect_content_type(r"\*not italic\*"), ContentType::Plain);
        assert_eq!(detect_content_type(r"\`not code\`"), ContentType::Plain);
    }

    #[test]
    fn test_markdown_to_html_bold_italic_strike() {
        assert_eq!(markdown_to_html("**bold**"), "<b>bold</b>");
        assert_eq!(markdown_to_html("*italic*"), "<i>italic</i>");
        assert_eq!(markdown_to_html("~~gone~~"), "<s>gone</s>");
    }

    #[test]
    fn test_markdown_to_html_code_block() {
        assert_eq!(
            markdown_to_html("```\nlet x = 1;\n```"),
            "<pre><code>let x = 1;\n</code></pre>"
        );
    }

    #[test]
    fn test_markdown_to_html_link() {
        assert_eq!(
            markdown_to_html("[docs](https://example.com)"),
            "<a href=\"https://example.com\">docs</a>"
        );
    }

    #[test]
    fn test_markdown_to_html_escapes_first() {
        assert_eq!(markdown_to_html("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_markdown_to_html_unclosed_bold_falls_back_to_italic_match() {
        // The unmatched leading `*` passes through literally; the trailing
        // `*broken*` still closes as italic since the scan is marker-local,
        // not bold-aware.
        assert_eq!(markdown_to_html("**broken*"), "*<i>broken</i>");
    }

    #[test]
    fn test_strip_formatting_then_detect_is_plain() {
        let stripped = strip_formatting("**bold** and *italic* and `code` and [a](b)");
        assert_eq!(detect_content_type(&stripped), ContentType::Plain);
        assert_eq!(stripped, "bold and italic and code and a");
    }
}
