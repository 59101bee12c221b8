use async_trait::async_trait;
use std::collections::HashMap;

/// Identity of an authorized caller, attached to every stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub client_id: String,
}

/// Resolves an opaque caller token to an authorized identity. The dashboard
/// session layer owns the real implementation; the crawler only needs the
/// yes/no answer and the client id.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Caller>;
}

/// Token table sourced from configuration.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Option<Caller> {
        self.tokens.get(token).map(|client_id| Caller {
            client_id: client_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_resolves_to_client() {
        let mut tokens = HashMap::new();
        tokens.insert("tok-1".to_string(), "client-a".to_string());
        let verifier = StaticTokenVerifier::new(tokens);

        let caller = verifier.verify("tok-1").await.unwrap();
        assert_eq!(caller.client_id, "client-a");
        assert!(verifier.verify("tok-2").await.is_none());
    }
}
