use crate::core::PolicyId;
use crate::security::nonce::RequestNonce;
use actix_web::HttpMessage;

/// Marks the policy linked to the page a handler is serving. The header
/// middleware merges it over the base policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePolicy(pub PolicyId);

pub trait CspExtensions {
    /// The nonce issued for this request, for `nonce="..."` attributes.
    fn csp_nonce(&self) -> Option<String>;
    fn set_page_policy(&self, id: PolicyId);
    fn page_policy(&self) -> Option<PolicyId>;
}

impl<T> CspExtensions for T
where
    T: HttpMessage,
{
    fn csp_nonce(&self) -> Option<String> {
        self.extensions()
            .get::<RequestNonce>()
            .map(|nonce| nonce.0.clone())
    }

    fn set_page_policy(&self, id: PolicyId) {
        self.extensions_mut().insert(PagePolicy(id));
    }

    fn page_policy(&self) -> Option<PolicyId> {
        self.extensions().get::<PagePolicy>().map(|page| page.0)
    }
}
