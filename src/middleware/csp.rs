use crate::compose::{ComposedPolicy, HeaderComposer, RenderOptions};
use crate::constants::{HEADER_NAME_CSP, HEADER_NAME_CSP_REPORT_ONLY};
use crate::core::{CspConfig, DeliveryMethod};
use crate::middleware::extensions::CspExtensions;
use crate::monitoring::stats::PerformanceTimer;
use crate::security::nonce::RequestNonce;
use crate::store::{PolicyStore, SelectionCriteria};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::{rc::Rc, sync::Arc};

/// Adds the composed `Content-Security-Policy` header to responses.
///
/// The policy is chosen after the handler has run, so a handler can link
/// its page policy through [`CspExtensions::set_page_policy`]. Responses that
/// already carry a CSP header are left alone.
#[derive(Clone)]
pub struct CspMiddleware {
    store: Arc<dyn PolicyStore>,
    config: Arc<CspConfig>,
}

impl CspMiddleware {
    #[inline]
    pub fn new(store: Arc<dyn PolicyStore>, config: CspConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn config(&self) -> Arc<CspConfig> {
        self.config.clone()
    }

    #[inline]
    pub fn store(&self) -> Arc<dyn PolicyStore> {
        self.store.clone()
    }
}

impl<S, B> Transform<S, ServiceRequest> for CspMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CspMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CspMiddlewareService {
            service: Rc::new(service),
            store: self.store.clone(),
            config: self.config.clone(),
        }))
    }
}

pub struct CspMiddlewareService<S> {
    service: Rc<S>,
    store: Arc<dyn PolicyStore>,
    config: Arc<CspConfig>,
}

impl<S, B> Service<ServiceRequest> for CspMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let store = self.store.clone();
        let config = self.config.clone();

        Box::pin(async move {
            config.stats().increment_request_count();

            let nonce = match config.generate_nonce() {
                Ok(nonce) => nonce,
                Err(e) => {
                    log::error!("Failed to generate CSP nonce: {}", e);
                    None
                }
            };
            if let Some(nonce) = &nonce {
                req.extensions_mut().insert(RequestNonce(nonce.clone()));
            }

            let mut res = service.call(req).await?;

            if has_csp_header(res.headers()) {
                log::debug!("Response already carries a CSP header, leaving it untouched");
                return Ok(res);
            }

            let criteria = SelectionCriteria::new(config.is_live(), DeliveryMethod::Header)
                .with_page_policy(res.request().page_policy());

            match compose_for_request(store.as_ref(), &config, &criteria, nonce.as_deref()) {
                Some(composed) => match composed.header_value() {
                    Ok(value) => {
                        res.headers_mut().insert(composed.header_name(), value);
                        config.stats().increment_header_emitted_count();
                    }
                    Err(e) => {
                        log::error!("Composed CSP is not a valid header value: {}", e);
                        config.stats().increment_suppressed_count();
                    }
                },
                None => config.stats().increment_suppressed_count(),
            }

            Ok(res)
        })
    }
}

/// Selects and composes the policy for one request, going through the
/// composition cache when no nonce is involved.
pub fn compose_for_request(
    store: &dyn PolicyStore,
    config: &CspConfig,
    criteria: &SelectionCriteria,
    nonce: Option<&str>,
) -> Option<Arc<ComposedPolicy>> {
    let timer = PerformanceTimer::new();

    let Some(selection) = store.select(criteria) else {
        log::debug!(
            "No {:?} policy applies (live: {}), CSP header suppressed",
            criteria.delivery_method,
            criteria.is_live
        );
        config.stats().add_compose_time(timer.elapsed());
        return None;
    };

    let composer = HeaderComposer::from_config(config);
    let options = match criteria.delivery_method {
        DeliveryMethod::Header => RenderOptions::header(),
        DeliveryMethod::MetaTag => RenderOptions::meta_tag(),
    }
    .with_nonce(nonce);

    let uses_nonce = nonce.is_some()
        && (selection.policy.contains_nonce()
            || selection
                .merge_from
                .as_ref()
                .is_some_and(|p| p.contains_nonce()));

    let composed = if uses_nonce {
        composer.compose_selection(&selection, &options).map(Arc::new)
    } else {
        let options = options.with_nonce(None);
        let key = composer.cache_key(&selection, &options);
        match config.get_cached_composition(&key) {
            Some(cached) => {
                config.stats().increment_cache_hit_count();
                Some(cached)
            }
            None => composer
                .compose_selection(&selection, &options)
                .map(|composed| config.cache_composition(key, composed)),
        }
    };

    config.stats().add_compose_time(timer.elapsed());

    if composed.is_none() {
        log::debug!(
            "Policy '{}' has no directives to send, CSP header suppressed",
            selection.policy.title()
        );
    }
    composed
}

fn has_csp_header(headers: &HeaderMap) -> bool {
    headers.contains_key(HEADER_NAME_CSP) || headers.contains_key(HEADER_NAME_CSP_REPORT_ONLY)
}

#[inline]
pub fn csp_middleware(store: Arc<dyn PolicyStore>) -> CspMiddleware {
    CspMiddleware::new(store, CspConfig::default())
}

#[inline]
pub fn csp_middleware_with_nonce(store: Arc<dyn PolicyStore>, nonce_length: usize) -> CspMiddleware {
    CspMiddleware::new(
        store,
        crate::core::CspConfigBuilder::new()
            .with_nonce_generator(nonce_length)
            .build(),
    )
}
