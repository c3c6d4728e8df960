//! Auth gate (optional): verifies the `X-Solana-Signature` /
//! `X-Solana-Nonce` / `X-Solana-PublicKey` header triple before
//! dispatch, and optionally consults a subscription ledger. The
//! signature scheme and the ledger protocol are external
//! collaborators, reached only through narrow traits — this crate
//! supplies a default ed25519 verifier since that is the scheme
//! implied by the `X-Solana-*` header family, but does not implement
//! the ledger itself.

use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::warn;

use crate::error::A2AError;

const SIG_HEADER: &str = "x-solana-signature";
const NONCE_HEADER: &str = "x-solana-nonce";
const PUBKEY_HEADER: &str = "x-solana-publickey";

/// Verifies that `signature` over `nonce` was produced by `public_key`.
/// All three are the raw (already base64-decoded, for the signature
/// and key) header values.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, public_key: &[u8], nonce: &[u8], signature: &[u8]) -> bool;
}

/// An external, abstract read-only capability consulted after
/// signature verification when the gate is configured with an
/// agent identity.
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    async fn has_active_subscription(&self, user: &str, agent: &str) -> bool;
}

/// Default verifier for the ed25519 scheme implied by `X-Solana-*`.
pub struct Ed25519Verifier;

#[async_trait]
impl SignatureVerifier for Ed25519Verifier {
    async fn verify(&self, public_key: &[u8], nonce: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_bytes);
        verifying_key.verify(nonce, &signature).is_ok()
    }
}

pub struct AuthGate {
    verifier: Box<dyn SignatureVerifier>,
    ledger: Option<(Box<dyn SubscriptionLedger>, String)>,
}

impl AuthGate {
    pub fn new(verifier: Box<dyn SignatureVerifier>) -> Self {
        AuthGate {
            verifier,
            ledger: None,
        }
    }

    /// Enable the ledger check. `agent_identity` is the agent-side key
    /// passed to `has_active_subscription(user, agent)`.
    pub fn with_ledger(mut self, ledger: Box<dyn SubscriptionLedger>, agent_identity: String) -> Self {
        self.ledger = Some((ledger, agent_identity));
        self
    }

    pub async fn check(&self, headers: &HeaderMap) -> Result<(), A2AError> {
        let signature_b64 = header_str(headers, SIG_HEADER)?;
        let nonce = header_str(headers, NONCE_HEADER)?;
        let public_key_b64 = header_str(headers, PUBKEY_HEADER)?;

        let engine = base64::engine::general_purpose::STANDARD;
        let signature = engine
            .decode(signature_b64)
            .map_err(|_| A2AError::auth_failed("signature header is not valid base64"))?;
        let public_key = engine
            .decode(public_key_b64)
            .map_err(|_| A2AError::auth_failed("public key header is not valid base64"))?;

        let ok = self
            .verifier
            .verify(&public_key, nonce.as_bytes(), &signature)
            .await;
        if !ok {
            warn!("auth gate rejected request: invalid signature");
            return Err(A2AError::auth_failed("invalid signature"));
        }

        if let Some((ledger, agent_identity)) = &self.ledger {
            let allowed = ledger
                .has_active_subscription(public_key_b64, agent_identity)
                .await;
            if !allowed {
                warn!("auth gate rejected request: no active subscription");
                return Err(A2AError::auth_failed("no active subscription"));
            }
        }

        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, A2AError> {
    headers
        .get(name)
        .ok_or_else(|| A2AError::auth_failed(format!("missing required header {name:?}")))?
        .to_str()
        .map_err(|_| A2AError::auth_failed(format!("header {name:?} is not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    struct AlwaysReject;

    #[async_trait]
    impl SignatureVerifier for AlwaysReject {
        async fn verify(&self, _pk: &[u8], _nonce: &[u8], _sig: &[u8]) -> bool {
            false
        }
    }

    struct AlwaysAccept;

    #[async_trait]
    impl SignatureVerifier for AlwaysAccept {
        async fn verify(&self, _pk: &[u8], _nonce: &[u8], _sig: &[u8]) -> bool {
            true
        }
    }

    fn headers_with(sig: &str, nonce: &str, pk: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(SIG_HEADER, HeaderValue::from_str(sig).unwrap());
        h.insert(NONCE_HEADER, HeaderValue::from_str(nonce).unwrap());
        h.insert(PUBKEY_HEADER, HeaderValue::from_str(pk).unwrap());
        h
    }

    #[tokio::test]
    async fn missing_headers_reject_with_auth_failed() {
        let gate = AuthGate::new(Box::new(AlwaysAccept));
        let err = gate.check(&HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.code(), crate::error::AUTH_FAILED);
    }

    #[tokio::test]
    async fn invalid_signature_rejects() {
        let gate = AuthGate::new(Box::new(AlwaysReject));
        let headers = headers_with("AA==", "nonce", "AA==");
        let err = gate.check(&headers).await.unwrap_err();
        assert_eq!(err.code(), crate::error::AUTH_FAILED);
    }

    #[tokio::test]
    async fn valid_signature_with_no_ledger_passes() {
        let gate = AuthGate::new(Box::new(AlwaysAccept));
        let headers = headers_with("AA==", "nonce", "AA==");
        assert!(gate.check(&headers).await.is_ok());
    }

    struct NoSubscription;

    #[async_trait]
    impl SubscriptionLedger for NoSubscription {
        async fn has_active_subscription(&self, _user: &str, _agent: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn ledger_rejection_surfaces_as_auth_failed() {
        let gate = AuthGate::new(Box::new(AlwaysAccept))
            .with_ledger(Box::new(NoSubscription), "agent-1".to_string());
        let headers = headers_with("AA==", "nonce", "AA==");
        let err = gate.check(&headers).await.unwrap_err();
        assert_eq!(err.code(), crate::error::AUTH_FAILED);
    }
}
