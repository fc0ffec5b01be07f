/*!
 * Request identity extractor
 *
 * Responsibility:
 * - middleware::auth が extensions に入れた Identity を handler に渡す
 *
 * Public API:
 * - CurrentIdentity
 */
mod current_identity;

pub use current_identity::CurrentIdentity;
