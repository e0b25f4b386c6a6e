//! Renderable element categories and their reload identifiers.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::domain::error::DomainError;

/// Separator between the kind token and the numeric id in a reload identifier.
pub const REF_SEPARATOR: &str = "::";

/// Parent tables whose children are classified as content elements rather
/// than modules when tagging templates.
pub const CONTENT_PARENT_TABLES: [&str; 3] = ["tl_article", "tl_news", "tl_calendar_events"];

/// The three renderable element categories supported by the reload mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Module,
    Content,
    Article,
}

impl ElementKind {
    pub const ALL: [ElementKind; 3] = [
        ElementKind::Module,
        ElementKind::Content,
        ElementKind::Article,
    ];

    /// Wire token embedded in markup and request parameters.
    pub fn token(self) -> &'static str {
        match self {
            ElementKind::Module => "mod",
            ElementKind::Content => "ce",
            ElementKind::Article => "art",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "mod" => Some(ElementKind::Module),
            "ce" => Some(ElementKind::Content),
            "art" => Some(ElementKind::Article),
            _ => None,
        }
    }

    /// Human-readable name used in error messages; an explicit mapping, so
    /// no runtime type introspection is ever needed.
    pub fn display_name(self) -> &'static str {
        match self {
            ElementKind::Module => "module",
            ElementKind::Content => "content element",
            ElementKind::Article => "article",
        }
    }

    /// Kind-specific pagination parameter name, e.g. `page_n12` for module 12.
    pub fn page_param(self, id: i64) -> String {
        let prefix = match self {
            ElementKind::Module => 'n',
            ElementKind::Content => 'c',
            ElementKind::Article => 'a',
        };
        format!("page_{prefix}{id}")
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A tagged reference to one reloadable element. Identity is `kind::id` and
/// must round-trip through its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub kind: ElementKind,
    pub id: i64,
}

impl ElementRef {
    pub fn new(kind: ElementKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind.token(), REF_SEPARATOR, self.id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseElementRefError {
    #[error("unknown element kind `{token}`")]
    UnknownKind { token: String },
    #[error("reload identifier `{raw}` carries no usable id")]
    InvalidId { raw: String },
}

impl FromStr for ElementRef {
    type Err = ParseElementRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (token, rest) = value.split_once(REF_SEPARATOR).unwrap_or((value, ""));
        let kind =
            ElementKind::from_token(token).ok_or_else(|| ParseElementRefError::UnknownKind {
                token: token.to_string(),
            })?;
        let id = rest
            .parse::<i64>()
            .map_err(|_| ParseElementRefError::InvalidId {
                raw: value.to_string(),
            })?;
        Ok(ElementRef { kind, id })
    }
}

/// Reload-related flags shared by every element record. Read-only per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadFlags {
    pub allow_ajax_reload: bool,
    pub ajax_reload_form_submit: bool,
}

impl ReloadFlags {
    pub fn enabled() -> Self {
        Self {
            allow_ajax_reload: true,
            ajax_reload_form_submit: false,
        }
    }

    pub fn with_form_submit(mut self) -> Self {
        self.ajax_reload_form_submit = true;
        self
    }
}

/// A front-end module (navigation, search, custom markup, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRecord {
    pub id: i64,
    pub module_type: String,
    pub name: String,
    pub css_id_attr: String,
    pub headline: Option<String>,
    pub body_html: String,
    pub flags: ReloadFlags,
}

/// A content element hosted by an article, news item or calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: i64,
    pub content_type: String,
    pub parent_table: String,
    pub css_id_attr: String,
    pub headline: Option<String>,
    pub body_html: String,
    pub flags: ReloadFlags,
}

/// A full article composed of its pre-rendered content.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub id: i64,
    pub title: String,
    pub css_id_attr: String,
    pub body_html: String,
    pub flags: ReloadFlags,
}

impl ModuleRecord {
    pub fn element_ref(&self) -> ElementRef {
        ElementRef::new(ElementKind::Module, self.id)
    }
}

impl ContentRecord {
    pub fn element_ref(&self) -> ElementRef {
        ElementRef::new(ElementKind::Content, self.id)
    }
}

impl ArticleRecord {
    pub fn element_ref(&self) -> ElementRef {
        ElementRef::new(ElementKind::Article, self.id)
    }
}

pub fn validate_css_id_attr(attr: &str) -> Result<(), DomainError> {
    if attr.contains('<') || attr.contains('>') {
        return Err(DomainError::validation(
            "css id attribute string must not contain markup",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{ElementKind, ElementRef, ParseElementRefError};

    #[test]
    fn identifier_round_trips_through_string_form() {
        for kind in ElementKind::ALL {
            let reference = ElementRef::new(kind, 42);
            let serialized = reference.to_string();
            let parsed = ElementRef::from_str(&serialized).expect("parse back");
            assert_eq!(parsed, reference);
        }
    }

    #[test]
    fn content_identifier_uses_ce_token() {
        assert_eq!(ElementRef::new(ElementKind::Content, 42).to_string(), "ce::42");
    }

    #[test]
    fn unknown_kind_token_is_rejected() {
        let err = ElementRef::from_str("foo::7").expect_err("must fail");
        assert_eq!(
            err,
            ParseElementRefError::UnknownKind {
                token: "foo".to_string()
            }
        );
    }

    #[test]
    fn missing_separator_reports_the_whole_value_as_kind() {
        let err = ElementRef::from_str("gibberish").expect_err("must fail");
        assert!(matches!(err, ParseElementRefError::UnknownKind { token } if token == "gibberish"));
    }

    #[test]
    fn non_numeric_id_is_rejected() {
        let err = ElementRef::from_str("mod::abc").expect_err("must fail");
        assert!(matches!(err, ParseElementRefError::InvalidId { .. }));
    }

    #[test]
    fn pagination_parameter_names_follow_kind_prefixes() {
        assert_eq!(ElementKind::Module.page_param(12), "page_n12");
        assert_eq!(ElementKind::Content.page_param(3), "page_c3");
        assert_eq!(ElementKind::Article.page_param(8), "page_a8");
    }
}
