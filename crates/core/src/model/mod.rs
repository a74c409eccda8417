mod activity;
pub mod catalogue;
mod ids;
mod patch;
mod progress;

pub use activity::{ActivityEvent, ActivityKind};
pub use catalogue::{QuizEntry, QuizFilter};
pub use ids::{ChapterId, ParseIdError, QuizId, SubjectKey};
pub use patch::{ChapterPatch, QuizPatch};
pub use progress::{ChapterProgress, ProgressState, QuizProgress, SubjectProgress};
