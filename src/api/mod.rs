/*
 * Responsibility
 * - 認証まわりの introspection / 稼働確認エンドポイント
 * - routes() の re-export
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
