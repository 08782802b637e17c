//! Text passes applied to rendered Markdown.

use std::sync::LazyLock;

use regex::Regex;

use crate::formatters::markdown::RenderOptions;
use crate::preprocess::restore_snob_marks;

static LINK_DESTINATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\]\(([^)\s<>]+)((?:\s+"[^"]*")?)\)"#).unwrap());

static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s").unwrap());

/// Post-process rendered Markdown according to the text-level render options
pub fn postprocess_markdown(markdown: &str, options: &RenderOptions) -> String {
    let mut processed = markdown.to_string();

    if options.escape_snob {
        processed = restore_snob_marks(&processed);
    }

    if options.protect_links {
        processed = protect_links(&processed);
    }

    if options.single_line_break {
        processed = collapse_blank_lines(&processed);
    }

    if options.body_width > 0 {
        processed = wrap_lines(&processed, options.body_width);
    }

    processed
}

/// Wrap link destinations in angle brackets: `](url)` becomes `](<url>)`
fn protect_links(markdown: &str) -> String {
    LINK_DESTINATION.replace_all(markdown, "](<$1>$2)").to_string()
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Collapse runs of blank lines into single line breaks outside fenced code
fn collapse_blank_lines(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let last = lines.len().saturating_sub(1);
    let mut out = Vec::with_capacity(lines.len());
    let mut in_fence = false;

    for (idx, line) in lines.into_iter().enumerate() {
        if is_fence(line) {
            in_fence = !in_fence;
        }

        // the final empty segment carries the trailing newline
        if !in_fence && idx != last && line.trim().is_empty() {
            continue;
        }

        out.push(line);
    }

    out.join("\n")
}

/// Lines that keep their layout when wrapping
fn is_structural(line: &str) -> bool {
    let trimmed = line.trim_start();
    line.starts_with("    ")
        || line.starts_with('\t')
        || trimmed.starts_with('#')
        || trimmed.starts_with('|')
        || trimmed.starts_with('>')
        || trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("+ ")
        || ORDERED_ITEM.is_match(trimmed)
}

/// Word-wrap plain paragraph lines to at most `width` characters
fn wrap_lines(markdown: &str, width: usize) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;

    for line in markdown.split('\n') {
        if is_fence(line) {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }

        if in_fence || is_structural(line) || line.chars().count() <= width {
            out.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RenderOptions {
        RenderOptions { single_line_break: false, ..RenderOptions::default() }
    }

    #[test]
    fn test_defaults_only_collapse() {
        let out = postprocess_markdown("# Title\n\n\nBody", &RenderOptions::default());
        assert_eq!(out, "# Title\nBody");
    }

    #[test]
    fn test_protect_links() {
        let md = r#"[a](http://a.com) and [b](/b "Bee") and [c](<http://c.com>)"#;
        assert_eq!(
            protect_links(md),
            r#"[a](<http://a.com>) and [b](</b> "Bee") and [c](<http://c.com>)"#
        );
    }

    #[test]
    fn test_collapse_keeps_fenced_blank_lines() {
        let md = "one\n\ntwo\n\n```\nfn a() {}\n\nfn b() {}\n```\n\nthree";
        assert_eq!(collapse_blank_lines(md), "one\ntwo\n```\nfn a() {}\n\nfn b() {}\n```\nthree");
    }

    #[test]
    fn test_collapse_keeps_trailing_newline() {
        assert_eq!(collapse_blank_lines("a\n\nb\n"), "a\nb\n");
    }

    #[test]
    fn test_wrap_lines() {
        let md = "alpha beta gamma delta epsilon";
        assert_eq!(wrap_lines(md, 11), "alpha beta\ngamma delta\nepsilon");
    }

    #[test]
    fn test_wrap_skips_structure_and_code() {
        let md = "# a long heading that stays\n- a long list item that stays\n```\na long code line that stays\n```";
        assert_eq!(wrap_lines(md, 8), md);
    }

    #[test]
    fn test_wrap_long_word_kept_whole() {
        assert_eq!(wrap_lines("https://example.com/very/long x", 10), "https://example.com/very/long\nx");
    }

    #[test]
    fn test_body_width_option() {
        let opts = RenderOptions { body_width: 10, ..options() };
        assert_eq!(postprocess_markdown("one two three four", &opts), "one two\nthree four");
    }
}
