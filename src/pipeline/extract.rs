//! Image-link extraction: note text → ordered [`ImageReference`]s.
//!
//! Recognised syntaxes, matched in one left-to-right pass (first alternative
//! wins at each position, matches never overlap):
//!
//! | Syntax                | `path`          | `name`                  |
//! |-----------------------|-----------------|-------------------------|
//! | `![alt](target)`      | `target`        | `alt` (may be empty)    |
//! | `![alt](<target>)`    | `target`        | `alt`                   |
//! | `![[target\|alt]]`    | `target`        | `target\|alt`           |
//! | `![[target]]`         | `target`        | `target`                |
//!
//! The wiki-embed `name` is the whole bracket interior, alt segment included.
//! The extractor does not classify paths; see [`crate::assets::is_url`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One image link found in a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Link target: relative path, URL, or wiki-link target before `|`.
    pub path: String,
    /// Alt text; empty when absent.
    pub name: String,
    /// The exact matched substring, used as the replacement key.
    pub source: String,
}

static RE_IMAGE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        !\[\[ (?P<wiki>[^\]\n]+) \]\]
        | !\[ (?P<alt_angle>[^\]\n]*) \]\( < (?P<angle>[^>\n]+) > \)
        | !\[ (?P<alt>[^\]\n]*) \]\( (?P<target>[^)\n]+) \)
        ",
    )
    .expect("image link regex")
});

/// Scan `text` for image links, in document order.
pub fn scan(text: &str) -> Vec<ImageReference> {
    RE_IMAGE_LINK
        .captures_iter(text)
        .filter_map(|caps| {
            let source = caps.get(0)?.as_str().to_string();

            if let Some(inner) = caps.name("wiki") {
                let inner = inner.as_str();
                let path = inner.split('|').next().unwrap_or(inner);
                return Some(ImageReference {
                    path: path.to_string(),
                    name: inner.to_string(),
                    source,
                });
            }

            let (alt, target) = match caps.name("angle") {
                Some(angle) => (caps.name("alt_angle"), angle),
                None => (caps.name("alt"), caps.name("target")?),
            };

            Some(ImageReference {
                path: target.as_str().to_string(),
                name: alt.map(|m| m.as_str()).unwrap_or_default().to_string(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(path: &str, name: &str, source: &str) -> ImageReference {
        ImageReference {
            path: path.into(),
            name: name.into(),
            source: source.into(),
        }
    }

    const MIXED: &str = "
      ![local image](./path/to/local-image.png)
      ![local image with angle brackets](<./path/to/local-image.png>)
      ![internet image](https://example.com/internet-image.jpg)
      ![[wiki link|alt text]]
    ";

    #[test]
    fn all_four_syntaxes() {
        assert_eq!(
            scan(MIXED),
            vec![
                reference(
                    "./path/to/local-image.png",
                    "local image",
                    "![local image](./path/to/local-image.png)"
                ),
                reference(
                    "./path/to/local-image.png",
                    "local image with angle brackets",
                    "![local image with angle brackets](<./path/to/local-image.png>)"
                ),
                reference(
                    "https://example.com/internet-image.jpg",
                    "internet image",
                    "![internet image](https://example.com/internet-image.jpg)"
                ),
                reference("wiki link", "wiki link|alt text", "![[wiki link|alt text]]"),
            ]
        );
    }

    #[test]
    fn sources_are_verbatim_substrings() {
        for r in scan(MIXED) {
            assert!(MIXED.contains(&r.source), "missing: {}", r.source);
        }
    }

    #[test]
    fn no_images() {
        assert!(scan("No images here!").is_empty());
        assert!(scan("").is_empty());
        assert!(scan("[not an image](./a.png)").is_empty());
    }

    #[test]
    fn empty_alt_text() {
        assert_eq!(
            scan("![](./a.png)"),
            vec![reference("./a.png", "", "![](./a.png)")]
        );
        assert_eq!(
            scan("![](https://example.com/internet-image.jpg)"),
            vec![reference(
                "https://example.com/internet-image.jpg",
                "",
                "![](https://example.com/internet-image.jpg)"
            )]
        );
    }

    // Pinned: the wiki-embed name keeps the full interior, alt segment included.
    #[test]
    fn wiki_link_name_includes_alt_segment() {
        assert_eq!(
            scan("![[wiki link|alt text]]"),
            vec![reference("wiki link", "wiki link|alt text", "![[wiki link|alt text]]")]
        );
    }

    #[test]
    fn wiki_link_without_alt() {
        assert_eq!(
            scan("![[photo.png]]"),
            vec![reference("photo.png", "photo.png", "![[photo.png]]")]
        );
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let text = "![a](x.png) and again ![a](x.png)";
        let refs = scan(text);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], refs[1]);
    }

    #[test]
    fn adjacent_links_do_not_merge() {
        let refs = scan("![a](1.png)![[2.png]]![b](<3 4.png>)");
        let paths: Vec<_> = refs.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["1.png", "2.png", "3 4.png"]);
    }

    #[test]
    fn plain_wiki_link_is_not_an_image() {
        assert!(scan("see [[other note]]").is_empty());
    }
}
