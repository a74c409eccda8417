use course_core::model::{ChapterId, QuizEntry, QuizFilter, QuizId, QuizProgress, SubjectKey};

use crate::progress_service::ProgressService;

/// A catalogue entry joined with the learner's result for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizListing {
    pub entry: QuizEntry,
    pub progress: Option<QuizProgress>,
}

/// Read-only quiz catalogue with substring filtering.
#[derive(Debug, Clone, Default)]
pub struct QuizCatalogueService {
    entries: Vec<QuizEntry>,
}

impl QuizCatalogueService {
    #[must_use]
    pub fn new(entries: Vec<QuizEntry>) -> Self {
        Self { entries }
    }

    /// The quizzes shipped with the course.
    #[must_use]
    pub fn builtin() -> Self {
        let economie = SubjectKey::economie();
        let sociologie = SubjectKey::sociologie();
        let science_po = SubjectKey::science_politique();
        Self::new(
            [
                ("quiz-croissance", "Les sources de la croissance économique", &economie, "croissance-economique", 12),
                ("quiz-marche", "Le fonctionnement du marché concurrentiel", &economie, "marche-concurrentiel", 10),
                ("quiz-defaillances", "Les défaillances du marché", &economie, "defaillances-marche", 8),
                ("quiz-monnaie", "Monnaie et financement de l'économie", &economie, "monnaie-financement", 10),
                ("quiz-socialisation", "La socialisation", &sociologie, "socialisation", 10),
                ("quiz-lien-social", "Le lien social", &sociologie, "lien-social", 9),
                ("quiz-deviance", "Déviance et contrôle social", &sociologie, "deviance", 8),
                ("quiz-opinion-publique", "Opinion publique et démocratie", &science_po, "opinion-publique", 10),
                ("quiz-vote", "Le comportement électoral", &science_po, "comportement-electoral", 11),
            ]
            .into_iter()
            .filter_map(|(id, title, subject, chapter, question_count)| {
                Some(QuizEntry {
                    id: QuizId::new(id).ok()?,
                    title: title.to_owned(),
                    subject: subject.clone(),
                    chapter: ChapterId::new(chapter).ok(),
                    question_count,
                })
            })
            .collect(),
        )
    }

    #[must_use]
    pub fn entries(&self) -> &[QuizEntry] {
        &self.entries
    }

    #[must_use]
    pub fn search(&self, filter: &QuizFilter) -> Vec<QuizEntry> {
        filter.apply(&self.entries).into_iter().cloned().collect()
    }

    /// Quizzes attached to a chapter, for the page sidebar.
    #[must_use]
    pub fn for_chapter(&self, subject: &SubjectKey, chapter: &ChapterId) -> Vec<QuizEntry> {
        self.entries
            .iter()
            .filter(|e| &e.subject == subject && e.chapter.as_ref() == Some(chapter))
            .cloned()
            .collect()
    }

    /// Filtered entries with their recorded progress.
    #[must_use]
    pub fn search_with_progress(
        &self,
        filter: &QuizFilter,
        progress: &ProgressService,
    ) -> Vec<QuizListing> {
        filter
            .apply(&self.entries)
            .into_iter()
            .map(|entry| QuizListing {
                progress: progress.quiz_progress(&entry.subject, &entry.id),
                entry: entry.clone(),
            })
            .collect()
    }
}
