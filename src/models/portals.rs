use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Portal {
    pub id: String,
    pub owner_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePortalRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePortalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// A validated portal title: non-empty, at most 256 graphemes, no characters
/// that would break rendering or path handling downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalTitle(String);

impl PortalTitle {
    pub fn parse(s: String) -> Result<PortalTitle, String> {
        let is_empty_or_whitespace = s.trim().is_empty();
        let is_too_long = s.graphemes(true).count() > 256;

        let forbidden_characters = ['/', '(', ')', '"', '<', '>', '\\', '{', '}'];
        let contains_forbidden_characters =
            s.chars().any(|g| forbidden_characters.contains(&g));

        if is_empty_or_whitespace || is_too_long || contains_forbidden_characters {
            Err(format!("{} is not a valid portal title.", s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for PortalTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::PortalTitle;
    use claim::{assert_err, assert_ok};

    #[test]
    fn a_256_grapheme_long_title_is_valid() {
        let title = "ё".repeat(256);
        assert_ok!(PortalTitle::parse(title));
    }

    #[test]
    fn a_title_longer_than_256_graphemes_is_rejected() {
        let title = "a".repeat(257);
        assert_err!(PortalTitle::parse(title));
    }

    #[test]
    fn whitespace_only_titles_are_rejected() {
        let title = " ".to_string();
        assert_err!(PortalTitle::parse(title));
    }

    #[test]
    fn empty_string_is_rejected() {
        let title = "".to_string();
        assert_err!(PortalTitle::parse(title));
    }

    #[test]
    fn titles_containing_an_invalid_character_are_rejected() {
        for name in &['/', '(', ')', '"', '<', '>', '\\', '{', '}'] {
            let title = name.to_string();
            assert_err!(PortalTitle::parse(title));
        }
    }

    #[test]
    fn a_valid_title_is_parsed_successfully() {
        let title = "Intranet migration portal".to_string();
        assert_ok!(PortalTitle::parse(title));
    }
}
