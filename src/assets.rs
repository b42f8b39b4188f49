//! Path, URL and file-name helpers shared by the uploaders and the downloader.

use rand::distr::Alphanumeric;
use rand::Rng;
use std::path::{Component, Path, PathBuf};

/// Extensions accepted as images (lowercase, with the leading dot).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".bmp", ".gif", ".svg", ".tiff", ".webp", ".avif",
];

/// A path that can be fetched over HTTP(S).
pub fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// `true` if `ext` (e.g. `.png`) is an image extension; case-insensitive.
pub fn is_an_image(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// `true` if the file name or path ends in an image extension.
pub fn is_asset_type_an_image(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| is_an_image(&format!(".{e}")))
        .unwrap_or(false)
}

/// The last path segment of a URL, without query string or fragment.
///
/// Returns an empty string when the URL has no usable segment.
pub fn url_asset(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                return last.to_string();
            }
        }
        return String::new();
    }
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query.rsplit('/').next().unwrap_or("").to_string()
}

/// The last line that looks like an uploaded image URL.
pub fn last_image<'a, I>(lines: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: DoubleEndedIterator,
{
    lines
        .into_iter()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("http") && is_asset_type_an_image(&url_asset(line)))
        .map(str::to_string)
}

/// Replace characters that are illegal in file names with `-`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect()
}

/// A random lowercase alphanumeric token of `len` characters.
pub fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Path of `target` relative to the directory `base`.
///
/// Both paths must be absolute (or both relative to the same root).
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for c in &target[common..] {
        out.push(c.as_os_str());
    }
    out
}

/// Percent-encode a relative path for a Markdown link, keeping `/` separators.
pub fn encode_link_path(path: &Path) -> String {
    path.components()
        .map(|c| urlencoding::encode(&c.as_os_str().to_string_lossy()).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-decode a link target; returns the input unchanged when it is not
/// valid percent-encoded UTF-8.
pub fn decode_link_path(path: &str) -> String {
    urlencoding::decode(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions() {
        assert!(is_an_image(".png"));
        assert!(is_an_image(".JPG"));
        assert!(!is_an_image(".txt"));
        assert!(is_asset_type_an_image("image.png"));
        assert!(is_asset_type_an_image("dir/photo.WebP"));
        assert!(!is_asset_type_an_image("document.txt"));
        assert!(!is_asset_type_an_image("noext"));
    }

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.com/a.png"));
        assert!(is_url("http://example.com/a.png"));
        assert!(!is_url("./a.png"));
        assert!(!is_url("httpfoo.png"));
    }

    #[test]
    fn url_asset_strips_query_and_fragment() {
        assert_eq!(
            url_asset("http://example.com/path/to/image.png?query=123#fragment"),
            "image.png"
        );
        assert_eq!(url_asset("https://example.com/"), "");
        assert_eq!(url_asset("not a url/x.gif?a=b"), "x.gif");
    }

    #[test]
    fn last_image_picks_last_matching_line() {
        let out = "[PicGo INFO]: Uploading...\n\
                   https://img.example.com/first.png\n\
                   [PicGo SUCCESS]:\n\
                   https://img.example.com/second.jpg\n\
                   https://example.com/not-an-image\n";
        assert_eq!(
            last_image(out.lines()),
            Some("https://img.example.com/second.jpg".to_string())
        );
        assert_eq!(last_image("nothing here".lines()), None);
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_file_name(r#"a\b/c:d*e?f"g<h>i|j"#), "a-b-c-d-e-f-g-h-i-j");
        assert_eq!(sanitize_file_name("plain name"), "plain name");
    }

    #[test]
    fn random_token_shape() {
        let t = random_token(5);
        assert_eq!(t.len(), 5);
        assert!(t.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn relative_paths() {
        assert_eq!(
            relative_path(Path::new("/vault/notes"), Path::new("/vault/notes/assets/a.png")),
            PathBuf::from("assets/a.png")
        );
        assert_eq!(
            relative_path(Path::new("/vault/notes/deep"), Path::new("/vault/assets/a.png")),
            PathBuf::from("../../assets/a.png")
        );
    }

    #[test]
    fn link_path_encoding() {
        assert_eq!(
            encode_link_path(Path::new("../my assets/photo 1.png")),
            "../my%20assets/photo%201.png"
        );
        assert_eq!(decode_link_path("my%20assets/a.png"), "my assets/a.png");
        assert_eq!(decode_link_path("bad%ZZ"), "bad%ZZ");
    }
}
