use thiserror::Error;

pub mod contact;
pub mod follow_up;
pub mod history;
pub mod knowledge;
pub mod settings;

pub use contact::{ContactRecord, ContactRepository};
pub use follow_up::{FollowUpJob, FollowUpRepository, JobStatus};
pub use history::HistoryRepository;
pub use knowledge::KnowledgeRepository;
pub use settings::SettingsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}
