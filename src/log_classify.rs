use serde::Serialize;

/// Coarse category of a line emitted by the sync script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogCategory {
    Push,
    Commit,
    QualityWarning,
    ConflictWarning,
    FilesystemWatch,
    Error,
    Generic,
}

/// Display tone the UI maps to an icon color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogTone {
    Success,
    Info,
    Warning,
    Error,
}

struct ClassificationRule {
    category: LogCategory,
    needles: &'static [&'static str],
}

impl ClassificationRule {
    fn matches(&self, line: &str) -> bool {
        self.needles.iter().any(|needle| line.contains(needle))
    }
}

// Evaluated top to bottom; the first match wins.
const CLASSIFICATION_RULES: [ClassificationRule; 6] = [
    ClassificationRule {
        category: LogCategory::Push,
        needles: &["[PUSH]"],
    },
    ClassificationRule {
        category: LogCategory::Commit,
        needles: &["[COMMIT]"],
    },
    ClassificationRule {
        category: LogCategory::QualityWarning,
        needles: &["[QUALITY]"],
    },
    ClassificationRule {
        category: LogCategory::ConflictWarning,
        needles: &["[WARN]", "[CONFLICT]"],
    },
    ClassificationRule {
        category: LogCategory::FilesystemWatch,
        needles: &["[FILTER]", "[WATCH]"],
    },
    ClassificationRule {
        category: LogCategory::Error,
        needles: &["[ERROR]", "Error"],
    },
];

pub fn classify_log_line(line: &str) -> LogCategory {
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| rule.matches(line))
        .map(|rule| rule.category)
        .unwrap_or(LogCategory::Generic)
}

impl LogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Commit => "commit",
            Self::QualityWarning => "quality-warning",
            Self::ConflictWarning => "conflict-warning",
            Self::FilesystemWatch => "filesystem-watch",
            Self::Error => "error",
            Self::Generic => "generic",
        }
    }

    pub fn tone(self) -> LogTone {
        match self {
            Self::Push | Self::Commit => LogTone::Success,
            Self::QualityWarning | Self::ConflictWarning => LogTone::Warning,
            Self::Error => LogTone::Error,
            Self::FilesystemWatch | Self::Generic => LogTone::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_tag() {
        let cases = [
            ("[PUSH] origin/main updated", LogCategory::Push),
            ("[COMMIT] feat: add login form", LogCategory::Commit),
            ("[QUALITY] commit message too short", LogCategory::QualityWarning),
            ("[WARN] merge conflict in src/app.ts", LogCategory::ConflictWarning),
            ("[CONFLICT] both modified README.md", LogCategory::ConflictWarning),
            ("[FILTER] ignored node_modules/x.js", LogCategory::FilesystemWatch),
            ("[WATCH] src/app.ts changed", LogCategory::FilesystemWatch),
            ("[ERROR] disk full", LogCategory::Error),
            ("Traceback: ValueError raised", LogCategory::Error),
            ("starting up", LogCategory::Generic),
        ];

        for (line, expected) in cases {
            assert_eq!(classify_log_line(line), expected, "line: {line}");
        }
    }

    #[test]
    fn push_wins_over_error_text() {
        assert_eq!(
            classify_log_line("[PUSH] Success (previous Error cleared)"),
            LogCategory::Push
        );
        assert_eq!(
            classify_log_line("[COMMIT] fix: handle [ERROR] prefix"),
            LogCategory::Commit
        );
    }

    #[test]
    fn watch_outranks_error() {
        assert_eq!(
            classify_log_line("[WATCH] ErrorBoundary.tsx changed"),
            LogCategory::FilesystemWatch
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(classify_log_line("[push] lowercase tag"), LogCategory::Generic);
        assert_eq!(classify_log_line("no error here"), LogCategory::Generic);
    }

    #[test]
    fn classification_is_stable() {
        let line = "[QUALITY] subject exceeds 72 chars";
        assert_eq!(classify_log_line(line), classify_log_line(line));
    }

    #[test]
    fn tones_follow_category() {
        assert_eq!(LogCategory::Push.tone(), LogTone::Success);
        assert_eq!(LogCategory::ConflictWarning.tone(), LogTone::Warning);
        assert_eq!(LogCategory::Error.tone(), LogTone::Error);
        assert_eq!(LogCategory::Generic.tone(), LogTone::Info);
        assert_eq!(LogCategory::QualityWarning.as_str(), "quality-warning");
    }
}
