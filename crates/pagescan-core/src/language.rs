//! Selectable recognition languages.

use std::fmt;

use serde::Serialize;

use crate::error::PagescanError;

/// Code of the auto-detect sentinel.
pub const AUTO_CODE: &str = "auto";

/// Engine language used when the caller asks for auto-detection.
pub const DEFAULT_ENGINE_LANGUAGE: &str = "eng";

/// A language the user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageOption {
    /// Engine code (ISO-639-3 style, e.g. `eng`, `chi_sim`).
    pub code: &'static str,
    /// English name.
    pub name: &'static str,
    /// Name in the language itself.
    pub native_name: &'static str,
}

const fn lang(code: &'static str, name: &'static str, native_name: &'static str) -> LanguageOption {
    LanguageOption {
        code,
        name,
        native_name,
    }
}

/// Every language offered besides auto-detect.
pub static LANGUAGE_OPTIONS: &[LanguageOption] = &[
    lang("eng", "English", "English"),
    lang("spa", "Spanish", "Español"),
    lang("fra", "French", "Français"),
    lang("deu", "German", "Deutsch"),
    lang("ita", "Italian", "Italiano"),
    lang("por", "Portuguese", "Português"),
    lang("rus", "Russian", "Русский"),
    lang("chi_sim", "Chinese (Simplified)", "简体中文"),
    lang("chi_tra", "Chinese (Traditional)", "繁體中文"),
    lang("jpn", "Japanese", "日本語"),
    lang("kor", "Korean", "한국어"),
    lang("ara", "Arabic", "العربية"),
    lang("hin", "Hindi", "हिन्दी"),
    lang("tha", "Thai", "ไทย"),
    lang("vie", "Vietnamese", "Tiếng Việt"),
    lang("nld", "Dutch", "Nederlands"),
    lang("pol", "Polish", "Polski"),
    lang("swe", "Swedish", "Svenska"),
    lang("nor", "Norwegian", "Norsk"),
    lang("dan", "Danish", "Dansk"),
    lang("fin", "Finnish", "Suomi"),
    lang("tur", "Turkish", "Türkçe"),
    lang("heb", "Hebrew", "עברית"),
    lang("ces", "Czech", "Čeština"),
    lang("hun", "Hungarian", "Magyar"),
    lang("ron", "Romanian", "Română"),
    lang("bul", "Bulgarian", "Български"),
    lang("hrv", "Croatian", "Hrvatski"),
    lang("slv", "Slovenian", "Slovenščina"),
    lang("slk", "Slovak", "Slovenčina"),
    lang("ukr", "Ukrainian", "Українська"),
    lang("ell", "Greek", "Ελληνικά"),
];

/// Codes written in scripts the shared Latin models cannot read.
const NON_LATIN_CODES: &[&str] = &[
    "rus", "chi_sim", "chi_tra", "jpn", "kor", "ara", "hin", "tha", "heb", "bul", "ukr", "ell",
];

/// Whether `code` needs its own models rather than the shared Latin ones.
pub fn needs_dedicated_models(code: &str) -> bool {
    NON_LATIN_CODES.contains(&code)
}

/// Requested recognition language.
///
/// `Auto` does not detect anything: the engine adapter maps it to
/// [`DEFAULT_ENGINE_LANGUAGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Auto,
    Code(&'static LanguageOption),
}

impl Language {
    /// Parse a language code as presented to the user.
    pub fn parse(code: &str) -> Result<Self, PagescanError> {
        let code = code.trim();
        if code.eq_ignore_ascii_case(AUTO_CODE) {
            return Ok(Language::Auto);
        }

        LANGUAGE_OPTIONS
            .iter()
            .find(|option| option.code.eq_ignore_ascii_case(code))
            .map(Language::Code)
            .ok_or_else(|| PagescanError::Config(format!("unsupported language: {}", code)))
    }

    /// Code as selected by the caller (`auto` for the sentinel).
    pub fn code(&self) -> &'static str {
        match self {
            Language::Auto => AUTO_CODE,
            Language::Code(option) => option.code,
        }
    }

    /// Code the recognition engine is loaded with.
    pub fn engine_code(&self) -> &'static str {
        match self {
            Language::Auto => DEFAULT_ENGINE_LANGUAGE,
            Language::Code(option) => option.code,
        }
    }

    /// Human readable label, e.g. `German (Deutsch)`.
    pub fn display_name(&self) -> String {
        match self {
            Language::Auto => "Auto-detect".to_string(),
            Language::Code(option) => format!("{} ({})", option.name, option.native_name),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_maps_to_default_engine_language() {
        let language = Language::parse("auto").unwrap();
        assert_eq!(language, Language::Auto);
        assert_eq!(language.engine_code(), "eng");
        assert_eq!(language.code(), "auto");
    }

    #[test]
    fn test_parse_known_code() {
        let language = Language::parse("deu").unwrap();
        assert_eq!(language.engine_code(), "deu");
        assert_eq!(language.display_name(), "German (Deutsch)");
    }

    #[test]
    fn test_parse_unknown_code() {
        assert!(Language::parse("klingon").is_err());
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<_> = LANGUAGE_OPTIONS.iter().map(|o| o.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), LANGUAGE_OPTIONS.len());
    }

    #[test]
    fn test_dedicated_models() {
        assert!(needs_dedicated_models("jpn"));
        assert!(needs_dedicated_models("ukr"));
        assert!(!needs_dedicated_models("eng"));
        assert!(!needs_dedicated_models("pol"));
        for code in NON_LATIN_CODES {
            assert!(Language::parse(code).is_ok(), "{}", code);
        }
    }
}
