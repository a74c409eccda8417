#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalogue_service;
pub mod error;
pub mod progress_service;
pub mod study_session;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use catalogue_service::{QuizCatalogueService, QuizListing};
pub use error::{AppServicesError, ProgressServiceError};
pub use progress_service::ProgressService;
pub use study_session::StudySession;
