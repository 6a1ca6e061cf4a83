use std::fmt;

use serde::Serialize;

/// Conventional-commit category derived from a message prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Chore,
    Refactor,
    Test,
    Merge,
    Style,
    Other,
}

impl CommitType {
    /// Prefixed types in match order; the first match wins
    pub const PREFIXED: [CommitType; 8] = [
        Self::Feat,
        Self::Fix,
        Self::Docs,
        Self::Chore,
        Self::Refactor,
        Self::Test,
        Self::Merge,
        Self::Style,
    ];

    pub const ALL: [CommitType; 9] = [
        Self::Feat,
        Self::Fix,
        Self::Docs,
        Self::Chore,
        Self::Refactor,
        Self::Test,
        Self::Merge,
        Self::Style,
        Self::Other,
    ];

    /// Classify a commit message by its lowercased prefix
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        Self::PREFIXED
            .into_iter()
            .find(|t| t.prefix().is_some_and(|p| lower.starts_with(p)))
            .unwrap_or(Self::Other)
    }

    /// Lowercase message prefix, `None` for `Other`
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Other => None,
            t => Some(t.as_str()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Docs => "docs",
            Self::Chore => "chore",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Merge => "merge",
            Self::Style => "style",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(s))
    }

    /// Display label for reports
    pub fn label(self) -> &'static str {
        match self {
            Self::Feat => "Features",
            Self::Fix => "Fixes",
            Self::Docs => "Documentation",
            Self::Chore => "Chores",
            Self::Refactor => "Refactoring",
            Self::Test => "Tests",
            Self::Merge => "Merges",
            Self::Style => "Style",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefixes() {
        assert_eq!(CommitType::classify("feat: login page"), CommitType::Feat);
        assert_eq!(CommitType::classify("fix(api): null check"), CommitType::Fix);
        assert_eq!(CommitType::classify("docs: readme"), CommitType::Docs);
        assert_eq!(CommitType::classify("chore: bump deps"), CommitType::Chore);
        assert_eq!(CommitType::classify("refactor: split module"), CommitType::Refactor);
        assert_eq!(CommitType::classify("test: cover edge case"), CommitType::Test);
        assert_eq!(CommitType::classify("Merge pull request #4"), CommitType::Merge);
        assert_eq!(CommitType::classify("style: fmt"), CommitType::Style);
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(CommitType::classify("feat: fix bug"), CommitType::Feat);
        assert_eq!(CommitType::classify("fix: add feature"), CommitType::Fix);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(CommitType::classify("FEAT: shout"), CommitType::Feat);
        assert_eq!(CommitType::classify("Fix: Capitalized"), CommitType::Fix);
    }

    #[test]
    fn test_default_other() {
        assert_eq!(CommitType::classify("Unrelated change"), CommitType::Other);
        assert_eq!(CommitType::classify(""), CommitType::Other);
        // Prefix must be at the start
        assert_eq!(CommitType::classify("add feat: later"), CommitType::Other);
    }

    #[test]
    fn test_parse_and_display() {
        for t in CommitType::ALL {
            assert_eq!(CommitType::parse(t.as_str()), Some(t));
            assert_eq!(t.to_string(), t.as_str());
        }
        assert_eq!(CommitType::parse("FEAT"), Some(CommitType::Feat));
        assert_eq!(CommitType::parse("perf"), None);
        assert_eq!(CommitType::Other.prefix(), None);
    }
}
