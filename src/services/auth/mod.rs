pub mod chain;
pub mod claims;
pub mod error;
pub mod extractors;
pub mod factory;
pub mod guards;
pub mod identity;
pub mod permissions;
pub mod scopes;
pub mod service;

pub use chain::{AuthenticatorChain, DelegatedFailurePolicy};
pub use claims::{ClaimsCodec, DecodeError, TOKEN_ISSUER, TokenClaims, TokenType};
pub use error::{AuthError, SetupError};
pub use factory::build_auth_service;
pub use identity::{Identity, ScopeAllowList};
pub use permissions::{NamespaceMapping, NamespaceTranslator, PermissionCatalog};
pub use scopes::{RequirementError, ScopeRequirement};
pub use service::{AuthService, AuthServiceBuilder};
