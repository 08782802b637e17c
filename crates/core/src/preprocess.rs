//! HTML rewriting applied before Markdown rendering.
//!
//! A single streaming pass over the markup resolves link and image targets
//! against the base URL and applies the element-dropping render options.

use std::cell::Cell;
use std::rc::Rc;

use lol_html::html_content::ContentType;

use crate::formatters::citations::{is_absolute, resolve_url};
use crate::formatters::markdown::RenderOptions;

/// Characters escaped in text when `escape_snob` is on. The renderer already
/// escapes `*`, `_`, backticks and brackets, so only the rest are marked here.
const SNOB_CHARS: &[char] = &['{', '}', '(', ')', '#', '!'];

/// Placeholder written before each snob character; the renderer leaves it
/// alone and [`restore_snob_marks`] turns it into a backslash afterwards.
pub(crate) const SNOB_MARK: char = '\u{E000}';

/// Rewrite `html` according to the element-level render options.
///
/// - relative `a[href]` and `img[src]` are resolved against `base_url`
/// - `ignore_links` unwraps anchors, keeping their text
/// - `ignore_images` drops `img` elements
/// - `ignore_emphasis` unwraps `em`, `strong`, `i` and `b`
/// - `escape_snob` marks Markdown punctuation in text outside `pre` and
///   `code` for escaping once rendering is done
///
/// Returns the input unchanged when no option applies or the rewriter fails.
pub fn prepare_html(html: &str, options: &RenderOptions) -> String {
    let resolve = !options.base_url.is_empty();
    if !(resolve || options.ignore_links || options.ignore_images || options.ignore_emphasis || options.escape_snob) {
        return html.to_string();
    }

    let base_url = options.base_url.as_str();
    let code_depth = Rc::new(Cell::new(0usize));
    let code_depth_for_text = Rc::clone(&code_depth);

    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                if options.ignore_links {
                    Some(lol_html::element!("a", |el| {
                        el.remove_and_keep_content();
                        Ok(())
                    }))
                } else if resolve {
                    Some(lol_html::element!("a[href]", |el| {
                        if let Some(href) = el.get_attribute("href")
                            && needs_resolution(&href)
                        {
                            el.set_attribute("href", &resolve_url(base_url, &href)).ok();
                        }
                        Ok(())
                    }))
                } else {
                    None
                },
                if options.ignore_images {
                    Some(lol_html::element!("img", |el| {
                        el.remove();
                        Ok(())
                    }))
                } else if resolve {
                    Some(lol_html::element!("img[src]", |el| {
                        if let Some(src) = el.get_attribute("src")
                            && needs_resolution(&src)
                        {
                            el.set_attribute("src", &resolve_url(base_url, &src)).ok();
                        }
                        Ok(())
                    }))
                } else {
                    None
                },
                if options.ignore_emphasis {
                    Some(lol_html::element!("em, strong, i, b", |el| {
                        el.remove_and_keep_content();
                        Ok(())
                    }))
                } else {
                    None
                },
                if options.escape_snob {
                    Some(lol_html::element!("pre, code", move |el| {
                        code_depth.set(code_depth.get() + 1);

                        let depth = Rc::clone(&code_depth);
                        if let Some(handlers) = el.end_tag_handlers() {
                            let handler: lol_html::EndTagHandler<'static> =
                                Box::new(move |_end: &mut lol_html::html_content::EndTag<'_>| {
                                    depth.set(depth.get().saturating_sub(1));
                                    Ok(())
                                });
                            handlers.push(handler);
                        }
                        Ok(())
                    }))
                } else {
                    None
                },
                if options.escape_snob {
                    Some(lol_html::text!("*", move |text| {
                        if code_depth_for_text.get() == 0 && text.as_str().contains(SNOB_CHARS) {
                            let escaped = mark_snob_text(text.as_str());
                            text.replace(&escaped, ContentType::Html);
                        }
                        Ok(())
                    }))
                } else {
                    None
                },
            ]
            .into_iter()
            .flatten()
            .collect(),
            ..Default::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    match rewriter.write(html.as_bytes()) {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    match rewriter.end() {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    output
}

fn needs_resolution(target: &str) -> bool {
    !target.is_empty() && !target.starts_with('#') && !is_absolute(target)
}

/// Put [`SNOB_MARK`] before every snob character of raw text, leaving
/// character references such as `&#40;` intact
fn mark_snob_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_reference = false;
    for ch in text.chars() {
        match ch {
            '&' => in_reference = true,
            ';' => in_reference = false,
            c if c.is_whitespace() => in_reference = false,
            c if SNOB_CHARS.contains(&c) && !in_reference => out.push(SNOB_MARK),
            _ => {}
        }
        out.push(ch);
    }
    out
}

/// Replace the marks left by the `escape_snob` pre-pass with backslashes
pub(crate) fn restore_snob_marks(markdown: &str) -> String {
    markdown.replace(SNOB_MARK, "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RenderOptions {
        RenderOptions::default()
    }

    #[test]
    fn test_no_options_is_identity() {
        let html = r#"<p>Keep <a href="/x">this</a> *as is*</p>"#;
        assert_eq!(prepare_html(html, &options()), html);
    }

    #[test]
    fn test_resolves_relative_targets() {
        let html = r##"<a href="/docs">Docs</a><a href="#top">Top</a><img src="img/a.png"><a href="https://o.org/">O</a>"##;
        let opts = RenderOptions { base_url: "https://site.com/blog/".to_string(), ..options() };
        let out = prepare_html(html, &opts);

        assert!(out.contains(r#"href="https://site.com/blog/docs""#));
        assert!(out.contains(r##"href="#top""##));
        assert!(out.contains(r#"src="https://site.com/blog/img/a.png""#));
        assert!(out.contains(r#"href="https://o.org/""#));
    }

    #[test]
    fn test_ignore_links_keeps_text() {
        let opts = RenderOptions { ignore_links: true, ..options() };
        let out = prepare_html(r#"<p>See <a href="/x">the guide</a>.</p>"#, &opts);
        assert_eq!(out, "<p>See the guide.</p>");
    }

    #[test]
    fn test_ignore_images() {
        let opts = RenderOptions { ignore_images: true, ..options() };
        let out = prepare_html(r#"<p>Logo: <img src="a.png" alt="A"> end</p>"#, &opts);
        assert_eq!(out, "<p>Logo:  end</p>");
    }

    #[test]
    fn test_ignore_emphasis() {
        let opts = RenderOptions { ignore_emphasis: true, ..options() };
        let out = prepare_html("<p><em>a</em> <strong>b</strong> <i>c</i> <b>d</b></p>", &opts);
        assert_eq!(out, "<p>a b c d</p>");
    }

    #[test]
    fn test_escape_snob_skips_code() {
        let opts = RenderOptions { escape_snob: true, ..options() };
        let out = prepare_html("<p>Wow! snake_case</p><pre><code>f(a_b);</code></pre><p>(x)</p>", &opts);
        let restored = restore_snob_marks(&out);

        assert!(restored.contains(r"Wow\! snake_case"));
        assert!(restored.contains("f(a_b);"));
        assert!(restored.contains(r"\(x\)"));
    }

    #[test]
    fn test_mark_snob_text() {
        assert_eq!(restore_snob_marks(&mark_snob_text("#1 {a} (b)!")), r"\#1 \{a\} \(b\)\!");
        assert_eq!(mark_snob_text("a*b_c`d"), "a*b_c`d");
        assert_eq!(mark_snob_text("&#40;x&#41; &amp; y!"), format!("&#40;x&#41; &amp; y{}!", SNOB_MARK));
    }
}
