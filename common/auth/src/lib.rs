pub mod authenticator;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod kind;
pub mod registry;
pub mod roles;
pub mod session;
pub mod signer;
pub mod verifier;

pub use authenticator::{Authenticator, DEFAULT_REGISTRY_TIMEOUT};
pub use claims::{TokenClaims, UserClaims};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{AdminContext, ApiKeyContext, AuthContext, ADMIN_TOKEN_HEADER, API_KEY_HEADER};
pub use guards::{ensure_role, ensure_self_or_admin};
pub use kind::{KeyDomain, TokenKind, ADMIN_TOKEN_TTL_SECONDS, ISSUER};
pub use registry::{AccessTokenRegistry, InMemoryAccessTokenRegistry};
pub use roles::{RoleAuthorizer, RoleDirectory, RoleMatch, ROLE_ADMIN, ROLE_CUSTOMER};
pub use session::{Passport, PassportBody, SessionManager};
pub use signer::{SignedToken, TokenSigner};
pub use verifier::JwtVerifier;
