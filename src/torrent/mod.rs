use regex::Regex;
use thiserror::Error;

/// Matches a bracketed alphanumeric token, e.g. `Some Show [AbC123xyz]`.
pub const DEFAULT_ID_PATTERN: &str = r"\[([A-Za-z0-9]{6,20})\]";

#[derive(Debug, Error)]
pub enum TorrentIdPatternError {
    #[error("invalid torrent ID pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("torrent ID pattern {0:?} must have exactly one capture group")]
    CaptureGroups(String),
}

/// Extracts torrent IDs embedded in folder and file names.
#[derive(Clone, Debug)]
pub struct TorrentIdPattern {
    re: Regex,
}

impl TorrentIdPattern {
    pub fn new(pattern: &str) -> Result<Self, TorrentIdPatternError> {
        let re = Regex::new(pattern)?;
        // captures_len() counts the implicit whole-match group too.
        if re.captures_len() != 2 {
            return Err(TorrentIdPatternError::CaptureGroups(pattern.to_owned()));
        }
        Ok(Self { re })
    }

    /// Returns the ID from the first match in `name`, if any.
    pub fn extract<'a>(&self, name: &'a str) -> Option<&'a str> {
        let id = self
            .re
            .captures(name)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str());
        tracing::debug!(name, ?id, "extracted torrent ID");
        id
    }

    pub fn as_str(&self) -> &str {
        self.re.as_str()
    }
}

impl Default for TorrentIdPattern {
    fn default() -> Self {
        Self {
            re: Regex::new(DEFAULT_ID_PATTERN).expect("default torrent ID pattern is valid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_default_pattern() {
        let pattern = TorrentIdPattern::default();
        assert_eq!(pattern.extract("Show.S01 [ABC123]"), Some("ABC123"));
        assert_eq!(pattern.extract("Show [aBc123XyZ789]"), Some("aBc123XyZ789"));
        assert_eq!(pattern.extract("Show"), None);
    }

    #[test]
    fn extract_respects_length_bounds() {
        let pattern = TorrentIdPattern::default();
        assert_eq!(pattern.extract("too short [ABC12]"), None);
        assert_eq!(pattern.extract("too long [ABCDEFGHIJ0123456789X]"), None);
        assert_eq!(
            pattern.extract("just right [ABCDEFGHIJ0123456789]"),
            Some("ABCDEFGHIJ0123456789")
        );
    }

    #[test]
    fn extract_rejects_non_alphanumeric() {
        let pattern = TorrentIdPattern::default();
        assert_eq!(pattern.extract("Show [ABC-123]"), None);
        assert_eq!(pattern.extract("Show (ABC123)"), None);
    }

    #[test]
    fn extract_uses_first_match() {
        let pattern = TorrentIdPattern::default();
        assert_eq!(pattern.extract("[FIRST123] and [SECOND456]"), Some("FIRST123"));
    }

    #[test]
    fn strict_pattern() {
        let pattern = TorrentIdPattern::new(r"\[([A-Z0-9]{12})\]").unwrap();
        assert_eq!(pattern.extract("Show [ABCDEF123456]"), Some("ABCDEF123456"));
        assert_eq!(pattern.extract("Show [abcdef123456]"), None);
    }

    #[test]
    fn pattern_without_capture_group_fails() {
        assert!(matches!(
            TorrentIdPattern::new(r"\[[A-Z0-9]{12}\]"),
            Err(TorrentIdPatternError::CaptureGroups(_))
        ));
        assert!(matches!(
            TorrentIdPattern::new(r"\[(\w+)\]-(\d+)"),
            Err(TorrentIdPatternError::CaptureGroups(_))
        ));
    }

    #[test]
    fn invalid_regex_fails() {
        assert!(matches!(
            TorrentIdPattern::new(r"\[("),
            Err(TorrentIdPatternError::Regex(_))
        ));
    }
}
