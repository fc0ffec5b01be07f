/*
 * Responsibility
 * - repo が上位に伝える意味の定義
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
    #[error("invalid token record {id}: {reason}")]
    InvalidRow { id: i64, reason: String },
}

pub type RepoResult<T> = Result<T, RepoError>;
