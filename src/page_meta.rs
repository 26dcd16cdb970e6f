use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::data_models::ImageDescriptor;

const MAX_IMAGES: usize = 20;

const LOW_VALUE_IMAGE_HINTS: &[&str] = &[
    "logo", "icon", "sprite", "pixel", "avatar", "badge", "spacer", "tracking",
];

/// Document-level facts read from a rendered page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageMeta {
    pub title: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub favicon: Option<String>,
    pub images: Vec<ImageDescriptor>,
}

impl PageMeta {
    /// `base_url` is the page's final URL; relative links resolve against it.
    pub fn parse(html: &str, base_url: &str) -> PageMeta {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();

        PageMeta {
            title: title(&document),
            language: language(&document),
            description: meta_content(&document, r#"meta[name="description"]"#)
                .or_else(|| meta_content(&document, r#"meta[property="og:description"]"#)),
            favicon: base.as_ref().and_then(|base| favicon(&document, base)),
            images: base.as_ref().map(|base| images(&document, base)).unwrap_or_default(),
        }
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.split_whitespace().collect::<Vec<&str>>().join(" ");
    if value.is_empty() { None } else { Some(value) }
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    select_first(document, css)
        .and_then(|el| el.value().attr("content"))
        .and_then(non_empty)
}

fn title(document: &Html) -> Option<String> {
    select_first(document, "title")
        .and_then(|el| non_empty(&el.text().collect::<String>()))
        .or_else(|| meta_content(document, r#"meta[property="og:title"]"#))
}

fn language(document: &Html) -> Option<String> {
    let html = select_first(document, "html")?;
    html.value()
        .attr("lang")
        .or_else(|| html.value().attr("xml:lang"))
        .and_then(non_empty)
        .map(|lang| lang.to_lowercase())
}

fn favicon(document: &Html, base: &Url) -> Option<String> {
    let declared = select_first(document, r#"link[rel~="icon"]"#)
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| base.join(href.trim()).ok());

    declared
        .or_else(|| base.join("/favicon.ico").ok())
        .map(|url| url.to_string())
}

fn images(document: &Html, base: &Url) -> Vec<ImageDescriptor> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();

    document
        .select(&selector)
        .filter_map(|img| {
            let element = img.value();
            let src = element
                .attr("src")
                .or_else(|| element.attr("data-src"))
                .map(str::trim)
                .filter(|src| !src.is_empty() && !src.starts_with("data:"))?;
            let url = base.join(src).ok()?;
            if !matches!(url.scheme(), "http" | "https") {
                return None;
            }
            let description = element
                .attr("alt")
                .and_then(non_empty)
                .or_else(|| element.attr("title").and_then(non_empty));
            let score = image_score(
                &url,
                description.is_some(),
                element.attr("width"),
                element.attr("height"),
            );
            Some(ImageDescriptor {
                url: url.to_string(),
                description,
                score,
            })
        })
        .filter(|image| seen.insert(image.url.clone()))
        .take(MAX_IMAGES)
        .collect()
}

/// Deterministic relevance: described, large images rank above icons and
/// tracking pixels.
pub fn image_score(
    url: &Url,
    has_description: bool,
    width: Option<&str>,
    height: Option<&str>,
) -> f64 {
    let mut score: f64 = 0.5;
    if has_description {
        score += 0.3;
    }

    let dimension = |value: Option<&str>| {
        value
            .map(|v| v.trim().trim_end_matches("px"))
            .and_then(|v| v.parse::<u32>().ok())
    };
    match (dimension(width), dimension(height)) {
        (Some(w), Some(h)) if w <= 2 && h <= 2 => score -= 0.5,
        (Some(w), _) | (_, Some(w)) if w >= 200 => score += 0.2,
        _ => {}
    }

    let path = url.path().to_lowercase();
    if LOW_VALUE_IMAGE_HINTS.iter().any(|hint| path.contains(hint)) {
        score -= 0.3;
    }

    (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
