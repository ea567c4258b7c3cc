//! Entities read from the annotation store.
//!
//! All of them are owned upstream; the crate only reads and re-projects
//! them. Row structs mirror the columns the resolvers select.

use serde::Serialize;

use crate::error::IntegrityError;

/// A transcribed unit paired with its timing event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub id: i64,
    pub transcript_id: i64,
    pub informant_id: Option<i64>,
    pub text: Option<String>,
    pub ortho: Option<String>,
    pub phon: Option<String>,
    pub pos: Option<String>,
    pub lemma: Option<String>,
    pub dependency: Option<String>,
    pub entity_type: Option<String>,
    pub token_reihung: Option<i64>,
}

/// How a token renders in a transcript, derived from its orthographic text
/// and part of speech.
///
/// | Text / POS | Kind |
/// |------------|------|
/// | `((…s…))` | pause, the content is the duration |
/// | other `((…))` | incident, the content is its description |
/// | `(?)` | unclear |
/// | POS `PUNCT` | punctuation |
/// | anything else | word |
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Punctuation,
    Pause { duration: String },
    Incident { description: String },
    Unclear,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        let text = self
            .ortho
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default();

        if let Some(content) = text.strip_prefix("((").and_then(|t| t.strip_suffix("))")) {
            return if content.contains('s') {
                TokenKind::Pause {
                    duration: content.to_string(),
                }
            } else {
                TokenKind::Incident {
                    description: content.to_string(),
                }
            };
        }
        if text == "(?)" {
            return TokenKind::Unclear;
        }
        if self.pos.as_deref() == Some("PUNCT") {
            return TokenKind::Punctuation;
        }
        TokenKind::Word
    }
}

/// Timing of a token, in milliseconds from the start of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: i64,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A group of tokens. `from_token`/`to_token` are advisory hints only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenSet {
    pub id: i64,
    pub from_token: Option<i64>,
    pub to_token: Option<i64>,
}

impl TokenSet {
    pub fn has_boundary_hints(&self) -> bool {
        self.from_token.is_some() && self.to_token.is_some()
    }
}

/// What an answer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AnswerTarget {
    Token(i64),
    TokenSet(i64),
}

impl AnswerTarget {
    /// Build the target from the two alternative foreign-key columns.
    pub fn from_columns(
        answer_id: i64,
        is_token_id: Option<i64>,
        is_tokenset_id: Option<i64>,
    ) -> Result<Self, IntegrityError> {
        match (is_token_id, is_tokenset_id) {
            (Some(token_id), None) => Ok(AnswerTarget::Token(token_id)),
            (None, Some(tokenset_id)) => Ok(AnswerTarget::TokenSet(tokenset_id)),
            (Some(token_id), Some(tokenset_id)) => Err(IntegrityError::AmbiguousAnswerTarget {
                answer_id,
                token_id,
                tokenset_id,
            }),
            (None, None) => Err(IntegrityError::MissingAnswerTarget { answer_id }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub id: i64,
    pub target: AnswerTarget,
    pub comment: Option<String>,
}

/// One `antworten_tags` row joined to its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTagRow {
    pub answer_id: i64,
    pub tag_id: i64,
    pub tag: String,
    pub tag_long: Option<String>,
    pub tag_comment: Option<String>,
    pub layer: i64,
    pub reihung: Option<i64>,
}

/// A child of a tag through the static tag family relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildTag {
    pub tag_id: i64,
    pub tag: String,
    pub tag_long: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_token_column() {
        assert_eq!(
            AnswerTarget::from_columns(1, Some(101), None),
            Ok(AnswerTarget::Token(101))
        );
    }

    #[test]
    fn test_target_from_tokenset_column() {
        assert_eq!(
            AnswerTarget::from_columns(1, None, Some(7)),
            Ok(AnswerTarget::TokenSet(7))
        );
    }

    #[test]
    fn test_target_both_columns_is_ambiguous() {
        assert!(matches!(
            AnswerTarget::from_columns(4, Some(101), Some(7)),
            Err(IntegrityError::AmbiguousAnswerTarget { answer_id: 4, .. })
        ));
    }

    #[test]
    fn test_target_no_columns_is_missing() {
        assert_eq!(
            AnswerTarget::from_columns(9, None, None),
            Err(IntegrityError::MissingAnswerTarget { answer_id: 9 })
        );
    }

    fn token(ortho: Option<&str>, text: Option<&str>, pos: Option<&str>) -> Token {
        Token {
            id: 1,
            transcript_id: 1,
            informant_id: None,
            text: text.map(str::to_string),
            ortho: ortho.map(str::to_string),
            phon: None,
            pos: pos.map(str::to_string),
            lemma: None,
            dependency: None,
            entity_type: None,
            token_reihung: None,
        }
    }

    #[test]
    fn test_token_kind_markers() {
        assert_eq!(
            token(Some("((1.2s))"), None, None).kind(),
            TokenKind::Pause {
                duration: "1.2s".into()
            }
        );
        assert_eq!(
            token(Some("((lacht))"), None, None).kind(),
            TokenKind::Incident {
                description: "lacht".into()
            }
        );
        assert_eq!(token(Some("(?)"), None, Some("X")).kind(), TokenKind::Unclear);
        assert_eq!(token(Some("."), None, Some("PUNCT")).kind(), TokenKind::Punctuation);
        assert_eq!(token(Some("Haus"), None, Some("NOUN")).kind(), TokenKind::Word);
    }

    #[test]
    fn test_token_kind_falls_back_to_text() {
        assert_eq!(
            token(None, Some("((3s))"), None).kind(),
            TokenKind::Pause {
                duration: "3s".into()
            }
        );
        assert_eq!(token(None, None, None).kind(), TokenKind::Word);
        // Unbalanced markers are plain words.
        assert_eq!(token(Some("((x)"), None, None).kind(), TokenKind::Word);
    }

    #[test]
    fn test_boundary_hints_need_both() {
        let set = |from, to| TokenSet {
            id: 1,
            from_token: from,
            to_token: to,
        };
        assert!(set(Some(1), Some(2)).has_boundary_hints());
        assert!(!set(Some(1), None).has_boundary_hints());
        assert!(!set(None, Some(2)).has_boundary_hints());
        assert!(!set(None, None).has_boundary_hints());
    }
}
