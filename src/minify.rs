//! Minification used by the pipeline's finalize phase.

use async_trait::async_trait;
use regex::Regex;

use crate::config::MinifyOptions;
use crate::error::StageError;

/// Markup minifier. The algorithm is pluggable per session.
#[async_trait]
pub trait Minifier: Send + Sync {
    async fn minify(&self, src: &str, options: &MinifyOptions) -> Result<String, StageError>;
}

/// Regex-based minifier: optional comment removal, whitespace collapsing and
/// trimming. It does not understand `<pre>` or inline scripts.
#[derive(Debug, Clone)]
pub struct BasicMinifier {
    comments: Regex,
    between_tags: Regex,
    whitespace: Regex,
}

impl BasicMinifier {
    pub fn new() -> Self {
        Self {
            comments: Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"),
            between_tags: Regex::new(r">\s+<").expect("tag gap pattern is valid"),
            whitespace: Regex::new(r"\s+").expect("whitespace pattern is valid"),
        }
    }

    pub fn minify_str(&self, src: &str, options: &MinifyOptions) -> String {
        let mut out = src.to_string();
        if options.remove_comments {
            out = self.comments.replace_all(&out, "").into_owned();
        }
        if options.collapse_whitespace {
            out = self.between_tags.replace_all(&out, "><").into_owned();
            out = self.whitespace.replace_all(&out, " ").into_owned();
        }
        out.trim().to_string()
    }
}

impl Default for BasicMinifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Minifier for BasicMinifier {
    async fn minify(&self, src: &str, options: &MinifyOptions) -> Result<String, StageError> {
        Ok(self.minify_str(src, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_collapse_but_keep_comments() {
        let minifier = BasicMinifier::new();
        let out = minifier.minify_str(
            "<div>\n  <span>foo   bar</span>\n</div>\n<!-- processor -->\n",
            &MinifyOptions::default(),
        );
        assert_eq!(out, "<div><span>foo bar</span></div><!-- processor -->");
    }

    #[test]
    fn test_remove_comments() {
        let minifier = BasicMinifier::new();
        let options = MinifyOptions {
            collapse_whitespace: false,
            remove_comments: true,
        };
        assert_eq!(minifier.minify_str("<p>a<!-- x --></p>\n", &options), "<p>a</p>");
    }

    #[tokio::test]
    async fn test_empty_source() {
        let minifier = BasicMinifier::new();
        let out = minifier.minify("", &MinifyOptions::default()).await.unwrap();
        assert_eq!(out, "");
    }
}
