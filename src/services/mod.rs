/*
 * Responsibility
 * - ドメインサービスの公開 (認証 / 認可)
 */
pub mod auth;
