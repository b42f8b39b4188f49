//! Source-span substitution.
//!
//! Each replacement swaps the first remaining occurrence of its `source`, so
//! a note that contains the same link twice gets both occurrences rewritten
//! when both appear in the replacement list.

/// One planned substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub source: String,
    pub link: String,
}

impl Replacement {
    /// Rewrite `source` to a standard image link.
    pub fn image_link(source: impl Into<String>, name: &str, target: &str) -> Self {
        Self {
            source: source.into(),
            link: format_image_link(name, target),
        }
    }
}

/// `![name](target)`
pub fn format_image_link(name: &str, target: &str) -> String {
    format!("![{name}]({target})")
}

/// Apply `replacements` in order. Replacements whose `source` is no longer
/// present are skipped; the count of applied ones is returned.
pub fn apply(text: &str, replacements: &[Replacement]) -> (String, usize) {
    let mut value = text.to_string();
    let mut applied = 0;
    for r in replacements {
        if r.source.is_empty() {
            continue;
        }
        if let Some(pos) = value.find(&r.source) {
            value.replace_range(pos..pos + r.source.len(), &r.link);
            applied += 1;
        }
    }
    (value, applied)
}
