use serde::{Deserialize, Serialize};

/// Language used for generated text such as default allocation descriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh-TW")]
    TraditionalChinese,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::TraditionalChinese => "zh-TW",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "zh-tw" | "zh" => Some(Language::TraditionalChinese),
            _ => None,
        }
    }

    /// Prefix of the description given to ratio allocations without a note.
    pub fn allocation_prefix(&self) -> &'static str {
        match self {
            Language::English => "Income allocated to",
            Language::TraditionalChinese => "收入分配至",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings injected into the ledger service by its caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    pub language: Language,
}

impl LedgerConfig {
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Description for an allocation to `passbook_name` when none was given.
    pub fn allocation_description(&self, passbook_name: &str) -> String {
        format!("{} {}", self.language.allocation_prefix(), passbook_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_description() {
        let config = LedgerConfig::default();
        assert_eq!(
            config.allocation_description("Savings"),
            "Income allocated to Savings"
        );

        let config = config.with_language(Language::TraditionalChinese);
        assert_eq!(config.allocation_description("儲蓄"), "收入分配至 儲蓄");
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::from_str("zh-TW"), Some(Language::TraditionalChinese));
        assert_eq!(Language::from_str("EN"), Some(Language::English));
        assert_eq!(Language::from_str("fr"), None);
    }
}
