pub mod error;
pub mod token_repo;

pub use error::{RepoError, RepoResult};
pub use token_repo::{PgTokenStore, TokenRecord, TokenStore};
