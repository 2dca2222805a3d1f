//! Request signing: the identity-provider capability and the header signer
//! that both the HTTP layer and the websocket upgrade go through.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::config::IdentityConfig;
use crate::error::CloverError;

/// Header carrying the per-request signature.
pub const SIGNATURE_HEADER: &str = "HJTRFS";

/// Header name → value.
pub type Headers = BTreeMap<String, String>;

/// The identity capability that knows how to authenticate requests.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one provider is shared by every
/// request manager and session built from the same [`HeaderSigner`].
#[async_trait]
pub trait HeadersProvider: Send + Sync + 'static {
    /// Exchange a random seed for a device id.
    async fn generate_device_id(&self, seed: &str) -> Result<String, CloverError>;

    /// Headers sent unchanged with every request.
    fn persistent_headers(&self) -> Headers;

    /// Headers describing this particular request.
    fn request_info_headers(
        &self,
        device_id: &str,
        request_id: &str,
        language: &str,
        country_code: &str,
        time_zone: i32,
    ) -> Headers;

    /// Sign `endpoint` (path plus query), the headers assembled so far, and the body.
    async fn generate_request_signature(
        &self,
        endpoint: &str,
        headers: &Headers,
        body: &[u8],
    ) -> Result<String, CloverError>;
}

/// Builds the full signed header set for outbound calls.
///
/// The device id is requested from the provider the first time it is needed
/// and cached for the lifetime of the signer.
pub struct HeaderSigner {
    provider: Arc<dyn HeadersProvider>,
    identity: IdentityConfig,
    device_id: OnceCell<String>,
}

impl HeaderSigner {
    pub fn new(provider: Arc<dyn HeadersProvider>, identity: IdentityConfig) -> Self {
        Self {
            provider,
            identity,
            device_id: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    /// The cached device id, if one has been obtained.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.get().map(String::as_str)
    }

    /// Return the device id, generating it with a fresh random seed on first use.
    ///
    /// Concurrent first callers share a single provider call.
    pub async fn ensure_device_id(&self) -> Result<&str, CloverError> {
        self.device_id
            .get_or_try_init(|| async {
                let seed = Uuid::new_v4().to_string();
                tracing::debug!("requesting device id from identity provider");
                self.provider.generate_device_id(&seed).await
            })
            .await
            .map(String::as_str)
    }

    /// Assemble the headers for one request.
    ///
    /// Order of precedence: persistent < request-info < `extra` < signature.
    /// Never reuse the result for another request; the signature covers
    /// `endpoint` and `body`.
    pub async fn build_headers(
        &self,
        endpoint: &str,
        body: &[u8],
        extra: &Headers,
    ) -> Result<Headers, CloverError> {
        let device_id = self.ensure_device_id().await?;
        let request_id = Uuid::new_v4().to_string();

        let mut headers = self.provider.persistent_headers();
        headers.extend(self.provider.request_info_headers(
            device_id,
            &request_id,
            &self.identity.language,
            &self.identity.country_code,
            self.identity.time_zone,
        ));
        headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let signature = self
            .provider
            .generate_request_signature(endpoint, &headers, body)
            .await?;
        headers.insert(SIGNATURE_HEADER.to_string(), signature);
        Ok(headers)
    }
}
