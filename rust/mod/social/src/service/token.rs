use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::model::{Claims, Purpose};
use crate::service::{SocialError, SocialService};

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> Result<String, SocialError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| SocialError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against an argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Argon2 hash of a throwaway password, checked against when no account
/// matches so unknown and known emails cost the same to reject.
pub(crate) fn dummy_hash() -> &'static str {
    static DUMMY: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    DUMMY.get_or_init(|| hash_password("twtr-no-such-account").unwrap_or_default())
}

impl SocialService {
    fn ttl(&self, purpose: Purpose) -> i64 {
        match purpose {
            Purpose::Access => self.config.access_token_ttl,
            Purpose::Confirm => self.config.confirm_token_ttl,
            Purpose::Reset => self.config.reset_token_ttl,
        }
    }

    /// Sign an HS256 token for `user_id`.
    ///
    /// Fails with `Internal` when no secret is configured.
    pub fn issue_token(
        &self,
        user_id: &str,
        purpose: Purpose,
        ver: Option<String>,
    ) -> Result<String, SocialError> {
        if self.config.jwt_secret.is_empty() {
            return Err(SocialError::Internal("JWT secret is not configured".into()));
        }
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            purpose,
            iat: now,
            exp: now + self.ttl(purpose),
            ver,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| SocialError::Internal(format!("JWT encode failed: {}", e)))
    }

    /// Decode and check a token. Wrong signature, expiry or purpose all
    /// fail with `Unauthorized`.
    pub fn verify_token(&self, token: &str, purpose: Purpose) -> Result<Claims, SocialError> {
        if self.config.jwt_secret.is_empty() {
            return Err(SocialError::Internal("JWT secret is not configured".into()));
        }
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| SocialError::Unauthorized(format!("invalid token: {}", e)))?
        .claims;

        if claims.purpose != purpose {
            return Err(SocialError::Unauthorized("token not valid for this use".into()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::fixture;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        let dummy = dummy_hash();
        assert!(dummy.starts_with("$argon2"));
        assert!(password_hash::PasswordHash::new(dummy).is_ok());
        assert!(!verify_password("correct horse battery", dummy));
        assert_eq!(dummy_hash(), dummy);
    }

    #[test]
    fn issue_and_verify() {
        let f = fixture();
        let token = f.svc.issue_token("u1", Purpose::Access, None).unwrap();
        let claims = f.svc.verify_token(&token, Purpose::Access).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn purpose_must_match() {
        let f = fixture();
        let token = f.svc.issue_token("u1", Purpose::Confirm, None).unwrap();
        assert!(matches!(
            f.svc.verify_token(&token, Purpose::Access),
            Err(SocialError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_is_unauthorized() {
        let f = fixture();
        assert!(matches!(
            f.svc.verify_token("not.a.jwt", Purpose::Access),
            Err(SocialError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let f = fixture();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "u1".into(),
            purpose: Purpose::Access,
            iat: now - 7200,
            exp: now - 3600,
            ver: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(f.svc.config().jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            f.svc.verify_token(&token, Purpose::Access),
            Err(SocialError::Unauthorized(_))
        ));
    }
}
