use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, LocalName, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use regex::Regex;
use std::cell::RefCell;
use std::sync::OnceLock;

/// Elements dropped with everything inside them.
const EXCLUDED_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "nav", "header", "footer", "aside",
    "menu", "form", "button", "iframe", "svg", "canvas", "video", "audio",
];

/// class/id tokens that mark page chrome rather than content.
const BOILERPLATE_TOKENS: &[&str] = &[
    "nav",
    "navbar",
    "navigation",
    "menu",
    "sidebar",
    "footer",
    "cookie",
    "cookies",
    "banner",
    "promo",
    "ad",
    "ads",
    "advert",
    "advertisement",
    "breadcrumb",
    "breadcrumbs",
    "share",
    "social",
    "popup",
    "newsletter",
    "badge",
];

/// Wide enough that html2text never re-wraps paragraphs.
const MARKDOWN_WIDTH: usize = 4096;

static NOISE_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
static LINK_PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
static IMAGE_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// Whole lines of UI chrome that survive HTML to markdown conversion.
fn get_noise_patterns() -> &'static Vec<Regex> {
    NOISE_PATTERNS.get_or_init(|| {
        compile(&[
            r"(?im)^\s*\[?(share|tweet|pin|email|print|copy|like|follow|subscribe)\]?\s*$",
            r"(?im)^\s*\[?(facebook|twitter|linkedin|instagram|youtube|tiktok|pinterest)\]?\s*$",
            r"(?im)^\s*\[?(accept|reject|cookie|privacy|gdpr|consent)\s*(all|cookies|settings|policy)?\]?\s*$",
            r"(?im)^\s*\[?(sign\s*(in|up|out)|log\s*(in|out)|register|login|logout)\]?\s*$",
            r"(?im)^\s*\[?(read\s*more|continue\s*reading|see\s*more|view\s*more|load\s*more)\]?\s*$",
            r"(?im)^\s*\[?skip\s*(to)?\s*(main)?\s*content\]?\s*$",
            r"(?im)^\s*©.*\d{4}.*$",
            r"(?im)^\s*all\s*rights\s*reserved.*$",
            r"(?m)^\s*[|\-*_#>•·–—]+\s*$",
        ])
    })
}

fn get_link_patterns() -> &'static Vec<(Regex, &'static str)> {
    LINK_PATTERNS.get_or_init(|| {
        [
            // footnote-style references emitted by html2text: [text][3] and "[3]: url"
            (r"(?m)^\[\d+\]:\s*\S+\s*$", ""),
            (r"\[([^\]]*)\]\[\d+\]", "$1"),
            // inline markdown links
            (r"\[([^\]]*)\]\([^)]+\)", "$1"),
            (r"https?://[^\s<>\x22)\]]+", ""),
            (r"\(\s*\)", ""),
            (r"\[\s*\]", ""),
        ]
        .into_iter()
        .filter_map(|(p, replacement)| Regex::new(p).ok().map(|re| (re, replacement)))
        .collect()
    })
}

fn get_image_patterns() -> &'static Vec<Regex> {
    IMAGE_PATTERNS.get_or_init(|| {
        compile(&[
            r"!\[[^\]]*\]\([^)]*\)",
            r"(?i)<img[^>]*>",
            r"(?im)^\s*https?://\S+\.(jpe?g|png|gif|webp|svg|ico|bmp|tiff?|avif|heic|heif)(\?\S*)?\s*$",
        ])
    })
}

/// A character filter receives text and returns a transformed version of it.
/// Filters are chained by [`ContentSanitizer`] in order.
pub trait CharacterFilter: Send + Sync {
    fn filter(&self, text: String) -> String;
}

/// Turns an HTML document into text, dropping non-content elements.
/// Block-level elements are separated by newlines.
#[derive(Debug, Default)]
pub struct HTMLTagFilter;

impl HTMLTagFilter {
    pub fn get_dom(html: &[u8]) -> RcDom {
        parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .one(html)
    }

    pub fn has_boilerplate_class_or_id(attrs: &RefCell<Vec<Attribute>>) -> bool {
        attrs.borrow().iter().any(|attr| {
            let name = &*attr.name.local;
            if name != "class" && name != "id" && name != "role" {
                return false;
            }
            attr.value
                .to_lowercase()
                .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
                .any(|token| BOILERPLATE_TOKENS.contains(&token))
        })
    }

    pub fn is_block_like(local: &LocalName) -> bool {
        matches!(
            &**local,
            "p" | "div"
                | "section"
                | "article"
                | "main"
                | "li"
                | "ul"
                | "ol"
                | "table"
                | "tr"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "blockquote"
                | "pre"
                | "br"
                | "hr"
                | "dd"
                | "dt"
                | "figcaption"
        )
    }

    /// Structural containers are never dropped for their class names,
    /// `<body class="has-sidebar">` is still the body.
    fn is_structural(local: &LocalName) -> bool {
        matches!(&**local, "html" | "body" | "main" | "article")
    }

    fn should_drop(handle: &Handle) -> bool {
        match &handle.data {
            NodeData::Element { name, attrs, .. } => {
                let local = &name.local;
                EXCLUDED_TAGS.contains(&&**local)
                    || (!Self::is_structural(local) && Self::has_boilerplate_class_or_id(attrs))
            }
            NodeData::Comment { .. } | NodeData::ProcessingInstruction { .. } => true,
            _ => false,
        }
    }

    pub fn walk_html(handle: &Handle, out: &mut String) {
        match &handle.data {
            NodeData::Text { contents } => {
                push_collapsed(out, &contents.borrow());
            }
            NodeData::Element { name, .. } => {
                if Self::should_drop(handle) {
                    return;
                }
                let block = Self::is_block_like(&name.local);
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                for child in handle.children.borrow().iter() {
                    Self::walk_html(child, out);
                }
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {
                for child in handle.children.borrow().iter() {
                    Self::walk_html(child, out);
                }
            }
        }
    }

    /// Removes every droppable node from the tree in place.
    pub fn prune(handle: &Handle) {
        handle
            .children
            .borrow_mut()
            .retain(|child| !Self::should_drop(child));
        for child in handle.children.borrow().iter() {
            Self::prune(child);
        }
    }
}

impl CharacterFilter for HTMLTagFilter {
    fn filter(&self, html: String) -> String {
        let dom = Self::get_dom(html.as_bytes());
        let mut out = String::new();
        Self::walk_html(&dom.document, &mut out);
        out
    }
}

/// Appends a text node with internal whitespace collapsed, keeping a single
/// space where the node had leading or trailing whitespace.
fn push_collapsed(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    let starts_with_space = text.starts_with(char::is_whitespace);
    let ends_with_space = text.ends_with(char::is_whitespace);
    let words: Vec<&str> = text.split_whitespace().collect();

    if starts_with_space && !out.is_empty() && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
    out.push_str(&words.join(" "));
    if ends_with_space && !words.is_empty() {
        out.push(' ');
    }
}

/// Trims every line, collapses runs of spaces and drops blank lines.
#[derive(Debug, Default)]
pub struct WhitespaceFilter;

impl WhitespaceFilter {
    pub fn compress_whitespaces(text: &str) -> String {
        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<&str>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<String>>()
            .join("\n")
    }
}

impl CharacterFilter for WhitespaceFilter {
    fn filter(&self, text: String) -> String {
        Self::compress_whitespaces(&text)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarkdownOptions {
    pub include_links: bool,
    pub include_images: bool,
}

/// HTML to readable content. Pure and deterministic: the same bytes always
/// produce the same output.
pub struct ContentSanitizer {
    char_filters: Vec<Box<dyn CharacterFilter>>,
}

impl Default for ContentSanitizer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(HTMLTagFilter),
            Box::new(WhitespaceFilter),
        ])
    }
}

impl ContentSanitizer {
    pub fn new(char_filters: Vec<Box<dyn CharacterFilter>>) -> Self {
        Self { char_filters }
    }

    pub fn char_filter(&self, mut content: String) -> String {
        for filter in self.char_filters.iter() {
            content = filter.filter(content);
        }
        content
    }

    /// Plain text of the page, or `None` when nothing readable is left.
    pub fn sanitize(&self, html: &[u8]) -> Option<String> {
        let text = self.char_filter(String::from_utf8_lossy(html).into_owned());
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Non-HTML text (plain bodies, PDF text layers) only gets whitespace
    /// cleanup; running it through the DOM filter would eat `<` and `&`.
    pub fn sanitize_plain(&self, text: &[u8]) -> Option<String> {
        let text = WhitespaceFilter::compress_whitespaces(&String::from_utf8_lossy(text));
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Markdown of the pruned page, or `None` when nothing readable is left.
    pub fn to_markdown(&self, html: &[u8], options: MarkdownOptions) -> Option<String> {
        let dom = HTMLTagFilter::get_dom(html);
        HTMLTagFilter::prune(&dom.document);

        let mut pruned = Vec::new();
        let document: SerializableHandle = dom.document.clone().into();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        };
        if let Err(e) = serialize(&mut pruned, &document, opts) {
            tracing::debug!("failed to serialize pruned document: {e}");
            return self.sanitize(html);
        }

        let markdown = match html2text::from_read(&pruned[..], MARKDOWN_WIDTH) {
            Ok(markdown) => markdown,
            Err(e) => {
                tracing::debug!("html2text failed, falling back to plain text: {e}");
                return self.sanitize(html);
            }
        };

        let mut markdown = clean_markdown_noise(&markdown);
        if !options.include_images {
            markdown = strip_image_links(&markdown);
        }
        if !options.include_links {
            markdown = strip_links(&markdown);
        }
        let markdown = collapse_blank_lines(&markdown);
        if markdown.is_empty() {
            None
        } else {
            Some(markdown)
        }
    }
}

pub fn clean_markdown_noise(markdown: &str) -> String {
    let mut result = markdown.to_string();
    for pattern in get_noise_patterns() {
        result = pattern.replace_all(&result, "").into_owned();
    }
    result
}

pub fn strip_links(markdown: &str) -> String {
    let mut result = markdown.to_string();
    for (pattern, replacement) in get_link_patterns() {
        result = pattern.replace_all(&result, *replacement).into_owned();
    }
    result
}

pub fn strip_image_links(markdown: &str) -> String {
    let mut result = markdown.to_string();
    for pattern in get_image_patterns() {
        result = pattern.replace_all(&result, "").into_owned();
    }
    result
}

static FORMATTING_PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

/// Markdown down to plain text: links become their text, headings, emphasis,
/// code fences and quote markers are removed.
pub fn markdown_to_text(markdown: &str) -> String {
    let patterns = FORMATTING_PATTERNS.get_or_init(|| {
        [
            (r"(?m)^```.*$", ""),
            (r"(?m)^\s{0,3}#{1,6}\s+", ""),
            (r"(?m)^\s*>\s?", ""),
            (r"\*\*([^*]+)\*\*", "$1"),
            (r"__([^_]+)__", "$1"),
            (r"\*([^*\s][^*]*)\*", "$1"),
            (r"`([^`]*)`", "$1"),
        ]
        .into_iter()
        .filter_map(|(p, replacement)| Regex::new(p).ok().map(|re| (re, replacement)))
        .collect()
    });

    let mut result = strip_links(&strip_image_links(markdown));
    for (pattern, replacement) in patterns {
        result = pattern.replace_all(&result, *replacement).into_owned();
    }
    collapse_blank_lines(&result)
}

/// Right-trims lines and allows at most one blank line in a row.
fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut last_was_blank = true;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !last_was_blank {
                lines.push("");
            }
            last_was_blank = true;
        } else {
            lines.push(line);
            last_was_blank = false;
        }
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_whitespaces() {
        let input = "\n\n\n\n\n\n\n\n\n";
        let output = WhitespaceFilter::compress_whitespaces(input);
        assert_eq!(output, "");
    }

    #[test]
    fn test_compress_whitespaces2() {
        let input =
            "something\n\n\n\n else is going one\n\n\n\n\n\n\n\n\n\nsomething                  ";
        let output = WhitespaceFilter::compress_whitespaces(input);
        assert_eq!(output, "something\nelse is going one\nsomething");
    }

    #[test]
    fn test_compress_whitespaces_collapses_inner_runs() {
        let output = WhitespaceFilter::compress_whitespaces("  a   b \t c  ");
        assert_eq!(output, "a b c");
    }

    #[test]
    fn test_html_tag_filter_skips_head() {
        let html = "<html><head><title>Hello World</title></head><body><h1>Hello World</h1><p>This is a test</p></body></html>";
        let filtered = HTMLTagFilter.filter(html.into());
        assert_eq!(filtered, "Hello World\nThis is a test\n");
    }

    #[test]
    fn test_inline_elements_do_not_split_words() {
        let html = "<p>foo<b>bar</b> baz <i>qux</i></p>";
        let filtered = HTMLTagFilter.filter(html.into());
        assert_eq!(filtered.trim(), "foobar baz qux");
    }

    #[test]
    fn test_structural_elements_survive_boilerplate_classes() {
        let sanitizer = ContentSanitizer::default();
        let html = br#"<html><body class="has-sidebar"><article class="ad-free"><p>Kept</p></article></body></html>"#;
        assert_eq!(sanitizer.sanitize(html).as_deref(), Some("Kept"));
    }

    #[test]
    fn test_boilerplate_tokens_match_whole_words_only() {
        let sanitizer = ContentSanitizer::default();
        let html = br#"<div class="uploads-list"><p>Files</p></div><div class="ad-slot"><p>Buy</p></div>"#;
        let text = sanitizer.sanitize(html).unwrap();
        assert!(text.contains("Files"));
        assert!(!text.contains("Buy"));
    }

    #[test]
    fn test_sanitize_plain_keeps_markup_characters() {
        let sanitizer = ContentSanitizer::default();
        let text = sanitizer.sanitize_plain(b"  if a < b && c > d {\n\n\n   return;  }\n");
        assert_eq!(text.as_deref(), Some("if a < b && c > d {\nreturn; }"));
        assert_eq!(sanitizer.sanitize_plain(b" \n\t "), None);
    }

    #[test]
    fn test_sanitize_empty_page_is_none() {
        let sanitizer = ContentSanitizer::default();
        assert_eq!(sanitizer.sanitize(b""), None);
        assert_eq!(
            sanitizer.sanitize(b"<html><body><script>var a = 1;</script>   </body></html>"),
            None
        );
    }

    #[test]
    fn test_strip_links_keeps_text() {
        let markdown = "See [the docs][1] and [home](https://example.com) or https://x.y/z\n\n[1]: https://docs.example.com";
        let stripped = strip_links(markdown);
        assert!(stripped.contains("See the docs and home or"));
        assert!(!stripped.contains("https://"));
    }

    #[test]
    fn test_strip_image_links() {
        let markdown = "Intro ![logo](https://example.com/logo.png) text\nhttps://cdn.example.com/pic.jpg?w=20\nend";
        let stripped = strip_image_links(markdown);
        assert!(!stripped.contains("logo.png"));
        assert!(!stripped.contains("pic.jpg"));
        assert!(stripped.contains("Intro"));
        assert!(stripped.contains("end"));
    }

    #[test]
    fn test_clean_markdown_noise() {
        let markdown = "Real paragraph\nShare\nTweet\nRead more\n© 2024 Example Corp\n---\nAnother paragraph";
        let cleaned = collapse_blank_lines(&clean_markdown_noise(markdown));
        assert_eq!(cleaned, "Real paragraph\n\nAnother paragraph");
    }

    #[test]
    fn test_markdown_to_text() {
        let markdown = "# Title\n\nSome **bold** and *soft* words with `code` and [a link](https://x.y).\n\n> quoted";
        assert_eq!(
            markdown_to_text(markdown),
            "Title\n\nSome bold and soft words with code and a link.\n\nquoted"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("\n\na  \n\n\n\nb\n\n"), "a\n\nb");
    }

    #[test]
    fn test_markdown_drops_boilerplate() {
        let sanitizer = ContentSanitizer::default();
        let html = br#"<html><body>
            <nav><a href="/">Home nav</a></nav>
            <article><h1>Headline</h1><p>Body text with <a href="https://example.com/more">a link</a>.</p></article>
            <footer>Footer stuff</footer>
        </body></html>"#;
        let markdown = sanitizer
            .to_markdown(
                html,
                MarkdownOptions {
                    include_links: false,
                    include_images: false,
                },
            )
            .unwrap();
        assert!(markdown.contains("Headline"));
        assert!(markdown.contains("Body text with a link"));
        assert!(!markdown.contains("Home nav"));
        assert!(!markdown.contains("Footer stuff"));
        assert!(!markdown.contains("https://example.com/more"));
    }

    #[test]
    fn test_markdown_of_empty_page_is_none() {
        let sanitizer = ContentSanitizer::default();
        let options = MarkdownOptions {
            include_links: true,
            include_images: true,
        };
        assert_eq!(
            sanitizer.to_markdown(b"<html><body><nav>only nav</nav></body></html>", options),
            None
        );
    }
}
