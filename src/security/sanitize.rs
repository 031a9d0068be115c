//! Input sanitization for messages that passed detection.
//!
//! Runs only after the injection scan, on text already judged clean, so it
//! can never be used to smuggle a signature past the detector.

use regex::Regex;

/// Compiled sanitization passes.
pub struct InputSanitizer {
    tags: Regex,
    whitespace: Regex,
}

impl InputSanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            tags: Regex::new(r"<[^>]*>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Strip tag-shaped substrings and `--`, trim, collapse whitespace.
    ///
    /// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
    pub fn sanitize(&self, input: &str) -> String {
        let without_tags = self.tags.replace_all(input, "");
        let without_comments = without_tags.replace("--", "");
        self.whitespace
            .replace_all(without_comments.trim(), " ")
            .into_owned()
    }
}

/// One-shot sanitization with a freshly compiled sanitizer.
///
/// Prefer holding an `InputSanitizer` on hot paths.
pub fn sanitize_input(input: &str) -> Result<String, regex::Error> {
    Ok(InputSanitizer::new()?.sanitize(input))
}
