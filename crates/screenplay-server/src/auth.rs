// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The boundary this core keeps between itself and user-account storage
//! (credential storage lives externally): [`AuthProvider`] turns
//! a [`LoginRequest`] into the [`UserPublic`] record this core broadcasts
//! to peers, the same narrow-interface-at-the-boundary shape
//! [`crate::store::DocumentStore`] uses for persistence.

use screenplay_wire::{LoginErrorCode, LoginRequest, UserPublic};

/// Authenticates login attempts. Implementations own the credential
/// store; this core only needs the resulting [`UserPublic`] record.
pub trait AuthProvider: Send + Sync {
    /// Validate `req`, returning the logged-in user's public record or a
    /// [`LoginErrorCode`] value on failure.
    fn authenticate(&self, req: &LoginRequest) -> Result<UserPublic, u8>;
}

/// Accepts any non-empty, ASCII username with no password check. The
/// default for tests and for embedding applications that haven't wired
/// up a real account store yet.
#[derive(Debug, Default)]
pub struct AllowAllAuthProvider;

impl AuthProvider for AllowAllAuthProvider {
    fn authenticate(&self, req: &LoginRequest) -> Result<UserPublic, u8> {
        if req.username.is_empty() {
            return Err(LoginErrorCode::BAD_REQUEST);
        }
        Ok(UserPublic {
            username: req.username.clone(),
            visible_name: req.username.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_username_is_a_bad_request() {
        let provider = AllowAllAuthProvider;
        let req = LoginRequest {
            username: String::new(),
            password: Vec::new(),
        };
        assert_eq!(provider.authenticate(&req), Err(LoginErrorCode::BAD_REQUEST));
    }

    #[test]
    fn any_username_is_accepted() {
        let provider = AllowAllAuthProvider;
        let req = LoginRequest {
            username: "jross".to_string(),
            password: vec![1, 2, 3],
        };
        let user = provider.authenticate(&req).expect("accepted");
        assert_eq!(user.username, "jross");
        assert_eq!(user.visible_name, "jross");
    }
}
