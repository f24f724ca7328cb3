//! Supported translation languages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::validator::Validator;

/// A language a translation row may be written in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Arabic.
    Ar,
    /// English, the language new records are created in.
    #[default]
    En,
}

impl Language {
    /// Every allowed language.
    pub const ALL: [Self; 2] = [Self::Ar, Self::En];

    /// ISO 639-1 code, as stored in the `languages` table.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ar => "ar",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == s)
            .ok_or_else(|| CoreError::UnsupportedLanguage(s.to_string()))
    }
}

/// Parse `code`, recording a `language` error on failure.
pub fn validate_language(v: &mut Validator, code: &str) -> Option<Language> {
    v.check(!code.is_empty(), "language", "must be provided");
    match code.parse() {
        Ok(lang) => Some(lang),
        Err(_) => {
            v.add_error("language", format!("{code} not an allowed language"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_allowed_codes() {
        assert_eq!("ar".parse::<Language>().unwrap(), Language::Ar);
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert!(matches!(
            "fr".parse::<Language>(),
            Err(CoreError::UnsupportedLanguage(code)) if code == "fr"
        ));
    }

    #[test]
    fn validate_records_unknown_language() {
        let mut v = Validator::new();
        assert_eq!(validate_language(&mut v, "en"), Some(Language::En));
        assert!(v.valid());

        assert_eq!(validate_language(&mut v, "de"), None);
        assert_eq!(v.errors().get("language"), Some("de not an allowed language"));

        let mut v = Validator::new();
        assert_eq!(validate_language(&mut v, ""), None);
        assert_eq!(v.errors().get("language"), Some("must be provided"));
    }

    #[test]
    fn serializes_as_code() {
        assert_eq!(serde_json::to_value(Language::Ar).unwrap(), "ar");
        assert_eq!(Language::default(), Language::En);
    }
}
