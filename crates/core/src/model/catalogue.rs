use serde::{Deserialize, Serialize};

use super::{ChapterId, QuizId, SubjectKey};

/// A quiz listed in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizEntry {
    pub id: QuizId,
    pub title: String,
    pub subject: SubjectKey,
    pub chapter: Option<ChapterId>,
    pub question_count: u32,
}

/// In-memory catalogue filter: substring on title or id, optional subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizFilter {
    pub query: Option<String>,
    pub subject: Option<SubjectKey>,
}

impl QuizFilter {
    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: SubjectKey) -> Self {
        self.subject = Some(subject);
        self
    }

    #[must_use]
    pub fn matches(&self, entry: &QuizEntry) -> bool {
        if let Some(subject) = &self.subject {
            if &entry.subject != subject {
                return false;
            }
        }
        let Some(query) = self.query.as_deref().map(str::trim) else {
            return true;
        };
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        entry.title.to_lowercase().contains(&needle) || entry.id.as_str().contains(&needle)
    }

    /// Matching entries, in catalogue order.
    #[must_use]
    pub fn apply<'a>(&self, entries: &'a [QuizEntry]) -> Vec<&'a QuizEntry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }
}
