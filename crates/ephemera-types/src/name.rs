//! Display-name sanitization.
//!
//! A display name is only ever echoed back to clients (download filename,
//! retrieval reference). It never selects a backing object. Sanitization
//! still keeps it inert:
//! - Only the last path component survives (`/` and `\` both separate)
//! - Control characters are dropped
//! - Characters outside `[A-Za-z0-9._-]` become `_`
//! - Runs of dots collapse, and leading/trailing dots are stripped
//! - The extension is forced into the policy's allowed set
//! - The result never exceeds the policy's maximum length

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stem used when nothing usable survives sanitization.
const FALLBACK_STEM: &str = "download";

/// Rules applied by [`DisplayName::sanitize`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePolicy {
    /// Accepted extensions, lowercase, without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Extension appended when the supplied one is missing or not allowed.
    pub default_extension: String,
    /// Maximum length of the full name, extension included.
    pub max_len: usize,
}

impl NamePolicy {
    /// Check that the policy can always produce a valid name.
    pub fn validate(&self) -> Result<(), TypeError> {
        if !is_plain_extension(&self.default_extension) {
            return Err(TypeError::InvalidNamePolicy(format!(
                "default extension {:?} must be non-empty lowercase ascii alphanumeric",
                self.default_extension
            )));
        }
        if let Some(ext) = self.allowed_extensions.iter().find(|e| !is_plain_extension(e)) {
            return Err(TypeError::InvalidNamePolicy(format!(
                "allowed extension {ext:?} must be non-empty lowercase ascii alphanumeric"
            )));
        }
        if !self.allows(&self.default_extension) {
            return Err(TypeError::InvalidNamePolicy(format!(
                "default extension {:?} is not in the allowed set",
                self.default_extension
            )));
        }
        let fallback_len = FALLBACK_STEM.len() + 1 + self.default_extension.len();
        if self.max_len < fallback_len {
            return Err(TypeError::InvalidNamePolicy(format!(
                "max_len {} is shorter than the fallback name ({fallback_len})",
                self.max_len
            )));
        }
        Ok(())
    }

    /// Returns `true` if `ext` (any case) is an allowed extension.
    pub fn allows(&self, ext: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["pdf".into()],
            default_extension: "pdf".into(),
            max_len: 128,
        }
    }
}

fn is_plain_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Sanitized, cosmetic filename for a stored object.
///
/// # Examples
///
/// ```
/// use ephemera_types::{DisplayName, NamePolicy};
///
/// let policy = NamePolicy::default();
/// assert_eq!(DisplayName::sanitize("report.pdf", &policy).as_str(), "report.pdf");
/// assert_eq!(DisplayName::sanitize("../../etc/passwd", &policy).as_str(), "passwd.pdf");
/// assert_eq!(DisplayName::sanitize("..", &policy).as_str(), "download.pdf");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    /// Sanitize a caller-supplied name. Never fails: names with nothing
    /// usable left fall back to `download.<default_extension>`.
    pub fn sanitize(raw: &str, policy: &NamePolicy) -> Self {
        let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();

        let mut cleaned: String = last
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        while cleaned.contains("..") {
            cleaned = cleaned.replace("..", ".");
        }
        let cleaned = cleaned.trim_matches('.');

        let (stem, ext) = match cleaned.rsplit_once('.') {
            Some((stem, ext)) if policy.allows(ext) => (stem, ext.to_ascii_lowercase()),
            _ => (cleaned, policy.default_extension.clone()),
        };

        let budget = policy.max_len.saturating_sub(ext.len() + 1);
        let stem = truncate_stem(stem, budget);
        if stem.is_empty() || stem.chars().all(|c| c == '_') {
            return Self::fallback(policy);
        }
        Self(format!("{stem}.{ext}"))
    }

    /// The name given to objects whose original name is unknown.
    pub fn fallback(policy: &NamePolicy) -> Self {
        Self(format!("{FALLBACK_STEM}.{}", policy.default_extension))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension without the leading dot.
    pub fn extension(&self) -> &str {
        self.0.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default()
    }
}

fn truncate_stem(stem: &str, budget: usize) -> &str {
    // All surviving characters are ASCII, so byte offsets are char boundaries.
    let cut = &stem[..budget.min(stem.len())];
    cut.trim_end_matches('.')
}

impl fmt::Debug for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayName({:?})", self.0)
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sanitize(raw: &str) -> String {
        DisplayName::sanitize(raw, &NamePolicy::default()).0
    }

    #[test]
    fn plain_name_is_kept() {
        assert_eq!(sanitize("invoice-2024_01.pdf"), "invoice-2024_01.pdf");
    }

    #[test]
    fn extension_case_is_normalized() {
        assert_eq!(sanitize("Report.PDF"), "Report.pdf");
    }

    #[test]
    fn path_components_are_stripped() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd.pdf");
        assert_eq!(sanitize("C:\\Users\\me\\doc.pdf"), "doc.pdf");
        assert_eq!(sanitize("dir/"), "download.pdf");
    }

    #[test]
    fn disallowed_extension_gets_default_appended() {
        assert_eq!(sanitize("payload.exe"), "payload.exe.pdf");
        assert_eq!(sanitize("notes"), "notes.pdf");
    }

    #[test]
    fn control_and_unicode_characters_are_neutralized() {
        assert_eq!(sanitize("a\u{0}b\nc.pdf"), "abc.pdf");
        assert_eq!(sanitize("résumé.pdf"), "r_sum_.pdf");
        assert_eq!(sanitize("my file.pdf"), "my_file.pdf");
    }

    #[test]
    fn dot_only_names_fall_back() {
        assert_eq!(sanitize(""), "download.pdf");
        assert_eq!(sanitize("..."), "download.pdf");
        assert_eq!(sanitize(".pdf"), "pdf.pdf");
        assert_eq!(sanitize("???"), "download.pdf");
    }

    #[test]
    fn hidden_file_prefix_is_removed() {
        assert_eq!(sanitize(".bashrc"), "bashrc.pdf");
    }

    #[test]
    fn long_names_are_truncated() {
        let long = format!("{}.pdf", "x".repeat(500));
        let name = sanitize(&long);
        assert_eq!(name.len(), 128);
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn extension_accessor() {
        let name = DisplayName::sanitize("a.pdf", &NamePolicy::default());
        assert_eq!(name.extension(), "pdf");
    }

    #[test]
    fn policy_validation() {
        assert!(NamePolicy::default().validate().is_ok());

        let not_allowed = NamePolicy {
            allowed_extensions: vec!["txt".into()],
            ..NamePolicy::default()
        };
        assert!(not_allowed.validate().is_err());

        let dotted = NamePolicy {
            allowed_extensions: vec![".pdf".into()],
            ..NamePolicy::default()
        };
        assert!(dotted.validate().is_err());

        let tiny = NamePolicy {
            max_len: 4,
            ..NamePolicy::default()
        };
        assert!(tiny.validate().is_err());
    }

    #[test]
    fn multiple_allowed_extensions() {
        let policy = NamePolicy {
            allowed_extensions: vec!["pdf".into(), "txt".into()],
            default_extension: "pdf".into(),
            max_len: 64,
        };
        assert_eq!(DisplayName::sanitize("a.txt", &policy).as_str(), "a.txt");
        assert_eq!(DisplayName::sanitize("a.doc", &policy).as_str(), "a.doc.pdf");
    }

    proptest! {
        #[test]
        fn sanitized_names_are_always_inert(raw in any::<String>()) {
            let policy = NamePolicy::default();
            let name = DisplayName::sanitize(&raw, &policy);
            let s = name.as_str();

            prop_assert!(!s.is_empty());
            prop_assert!(s.len() <= policy.max_len);
            prop_assert!(s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));
            prop_assert!(!s.contains(".."));
            prop_assert!(!s.starts_with('.'));
            prop_assert!(policy.allows(name.extension()));
        }

        #[test]
        fn sanitize_is_idempotent(raw in "[ -~]{0,200}") {
            let policy = NamePolicy::default();
            let once = DisplayName::sanitize(&raw, &policy);
            let twice = DisplayName::sanitize(once.as_str(), &policy);
            prop_assert_eq!(once, twice);
        }
    }
}
