//! Bearer token verification

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subsvc_shared::UserId;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies HS256 tokens signed with the shared secret
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }

    /// Issue a token for `user_id`, valid for `ttl`
    pub fn issue_token(
        &self,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            user_id,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_validates() {
        let jwt = JwtManager::new("test-secret");
        let token = jwt.issue_token(42, Duration::hours(1)).unwrap();
        assert_eq!(jwt.validate_token(&token).unwrap().user_id, 42);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("one")
            .issue_token(42, Duration::hours(1))
            .unwrap();
        assert!(JwtManager::new("two").validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = JwtManager::new("test-secret");
        let token = jwt.issue_token(42, Duration::hours(-2)).unwrap();
        assert!(jwt.validate_token(&token).is_err());
    }

    #[test]
    fn test_token_without_user_id_rejected() {
        #[derive(Serialize)]
        struct Other {
            sub: String,
            exp: i64,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Other {
                sub: "someone".into(),
                exp: OffsetDateTime::now_utc().unix_timestamp() + 3600,
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(JwtManager::new("test-secret").validate_token(&token).is_err());
    }
}
