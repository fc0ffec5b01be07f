/*
 * Responsibility
 * - middleware の公開インターフェース (re-export)
 * - pub fn http::apply(...), auth::apply(...), guard::require_scopes(...) など
 */
pub mod auth;
pub mod guard;
pub mod http;
