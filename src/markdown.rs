use std::sync::OnceLock;

use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;

/// Options for the text-to-HTML capability. These map onto parser options
/// and event rewrites; everything beyond this surface belongs to
/// pulldown-cmark.
#[derive(Clone, Copy, Debug)]
pub struct MarkdownOptions {
    /// Pass raw HTML in the source through to the output. When false, raw
    /// HTML is downgraded to visible text.
    pub allow_raw_html: bool,
    /// Turn bare `http(s)://` URLs into links.
    pub auto_linkify: bool,
    /// Smart quotes, dashes and ellipses.
    pub typographic: bool,
    /// Treat single newlines as hard line breaks.
    pub hard_line_breaks: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            allow_raw_html: true,
            auto_linkify: true,
            typographic: false,
            hard_line_breaks: true,
        }
    }
}

/// A named post-processing step over the rendered HTML.
#[derive(Clone, Copy)]
pub struct Extension {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// `==text==` highlighting, rendered as `<mark>`.
pub fn mark_highlight() -> Extension {
    fn apply(html: &str) -> String {
        static RE_MARK: OnceLock<Regex> = OnceLock::new();
        let re = RE_MARK.get_or_init(|| Regex::new(r"==([^=\n]+)==").unwrap());
        re.replace_all(html, "<mark>$1</mark>").to_string()
    }
    Extension {
        name: "mark-highlight",
        apply,
    }
}

/// Markdown renderer plus an ordered list of extensions. Extensions run
/// over the rendered HTML in the order they were added.
pub struct MarkdownPipeline {
    options: MarkdownOptions,
    extensions: Vec<Extension>,
}

impl MarkdownPipeline {
    pub fn new(options: MarkdownOptions) -> Self {
        Self {
            options,
            extensions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn extension_names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|ext| ext.name).collect()
    }

    pub fn render(&self, text: &str) -> String {
        let mut parser_options = Options::empty();
        parser_options.insert(Options::ENABLE_TABLES);
        parser_options.insert(Options::ENABLE_STRIKETHROUGH);
        parser_options.insert(Options::ENABLE_TASKLISTS);
        if self.options.typographic {
            parser_options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }

        let events = Parser::new_ext(text, parser_options).map(|event| match event {
            Event::SoftBreak if self.options.hard_line_breaks => Event::HardBreak,
            Event::Html(raw) if !self.options.allow_raw_html => Event::Text(raw),
            Event::InlineHtml(raw) if !self.options.allow_raw_html => Event::Text(raw),
            other => other,
        });

        let mut out = String::new();
        html::push_html(&mut out, events);

        if self.options.auto_linkify {
            out = linkify(&out);
        }
        for extension in &self.extensions {
            out = (extension.apply)(&out);
        }
        out
    }
}

impl Default for MarkdownPipeline {
    fn default() -> Self {
        Self::new(MarkdownOptions::default())
    }
}

// Matches bare URLs in text positions (start of segment, after whitespace
// or a closing tag), leaving href attributes alone.
fn linkify_segment(html: &str) -> String {
    static RE_URL: OnceLock<Regex> = OnceLock::new();
    let re = RE_URL.get_or_init(|| Regex::new(r#"(^|[\s>])(https?://[^\s<"']+)"#).unwrap());
    re.replace_all(html, "$1<a href=\"$2\">$2</a>").to_string()
}

// Anchors already in the output are copied through whole, link text
// included; only the HTML between them is scanned for bare URLs.
fn linkify(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find("<a ") {
        out.push_str(&linkify_segment(&rest[..open]));
        let tail = &rest[open..];
        let anchor_end = tail
            .find("</a>")
            .map(|end| end + "</a>".len())
            .unwrap_or(tail.len());
        out.push_str(&tail[..anchor_end]);
        rest = &tail[anchor_end..];
    }
    out.push_str(&linkify_segment(rest));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(options: MarkdownOptions) -> MarkdownPipeline {
        MarkdownPipeline::new(options)
    }

    #[test]
    fn renders_heading() {
        let html = MarkdownPipeline::default().render("# Hi");
        assert!(html.contains("<h1>Hi</h1>"));
    }

    #[test]
    fn hard_line_breaks_promote_soft_breaks() {
        let html = pipeline(MarkdownOptions {
            auto_linkify: false,
            ..Default::default()
        })
        .render("one\ntwo");
        assert!(html.contains("<br"));
    }

    #[test]
    fn soft_breaks_stay_soft_when_disabled() {
        let html = pipeline(MarkdownOptions {
            hard_line_breaks: false,
            auto_linkify: false,
            ..Default::default()
        })
        .render("one\ntwo");
        assert!(!html.contains("<br"));
    }

    #[test]
    fn raw_html_is_downgraded_when_disallowed() {
        let html = pipeline(MarkdownOptions {
            allow_raw_html: false,
            auto_linkify: false,
            ..Default::default()
        })
        .render("before <script>alert(1)</script> after");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn raw_html_passes_through_when_allowed() {
        let html = pipeline(MarkdownOptions {
            auto_linkify: false,
            ..Default::default()
        })
        .render("a <em>b</em> c");
        assert!(html.contains("<em>b</em>"));
    }

    #[test]
    fn bare_urls_become_links() {
        let html = MarkdownPipeline::default().render("see https://example.com for more");
        assert!(html.contains("<a href=\"https://example.com\">https://example.com</a>"));
    }

    #[test]
    fn existing_links_are_not_double_wrapped() {
        let html = MarkdownPipeline::default().render("[here](https://example.com)");
        assert_eq!(html.matches("<a ").count(), 1);
    }

    #[test]
    fn url_link_text_is_not_wrapped_again() {
        let html =
            MarkdownPipeline::default().render("[https://example.com](https://example.com)");
        assert_eq!(html.matches("<a ").count(), 1);
        assert!(!html.contains("<a href=\"https://example.com\"><a "));
    }

    #[test]
    fn urls_around_an_existing_link_still_become_links() {
        let html = MarkdownPipeline::default()
            .render("https://one.example [mid](https://example.com) https://two.example");
        assert_eq!(html.matches("<a ").count(), 3);
        assert!(html.contains("<a href=\"https://one.example\">"));
        assert!(html.contains("<a href=\"https://two.example\">"));
    }

    #[test]
    fn extensions_run_in_registration_order() {
        fn first(html: &str) -> String {
            format!("{html}|first")
        }
        fn second(html: &str) -> String {
            format!("{html}|second")
        }
        let pipeline = MarkdownPipeline::default()
            .with_extension(Extension {
                name: "first",
                apply: first,
            })
            .with_extension(Extension {
                name: "second",
                apply: second,
            });
        assert_eq!(pipeline.extension_names(), vec!["first", "second"]);
        let html = pipeline.render("x");
        assert!(html.ends_with("|first|second"));
    }

    #[test]
    fn mark_highlight_extension_rewrites_marks() {
        let pipeline = MarkdownPipeline::default().with_extension(mark_highlight());
        let html = pipeline.render("this is ==important== text");
        assert!(html.contains("<mark>important</mark>"));
    }
}
