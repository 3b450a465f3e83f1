use crate::core::CspConfig;
use crate::monitoring::report::{parse_violation_reports, CspViolationReport};
use crate::monitoring::stats::CspStats;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorPayloadTooLarge},
    http::Method,
    Error, HttpResponse,
};
use bytes::BytesMut;
use futures::{
    future::{ready, Ready},
    Future, StreamExt,
};
use std::{borrow::Cow, pin::Pin, rc::Rc, sync::Arc};

type ViolationHandler = Arc<dyn Fn(CspViolationReport) + Send + Sync + 'static>;

/// Accepts violation reports POSTed to the report path and hands each one to
/// a callback. Other requests pass through untouched.
pub struct CspReportingMiddleware {
    handler: ViolationHandler,
    report_path: Cow<'static, str>,
    max_report_size: usize,
    stats: Arc<CspStats>,
}

impl CspReportingMiddleware {
    pub fn new<F>(config: &CspConfig, handler: F) -> Self
    where
        F: Fn(CspViolationReport) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            report_path: Cow::Owned(config.report_path().to_owned()),
            max_report_size: config.max_report_size(),
            stats: config.stats().clone(),
        }
    }

    #[inline]
    pub fn with_report_path(mut self, path: impl Into<Cow<'static, str>>) -> Self {
        self.report_path = path.into();
        self
    }

    #[inline]
    pub fn with_max_report_size(mut self, size: usize) -> Self {
        self.max_report_size = size;
        self
    }

    #[inline]
    pub fn stats(&self) -> &Arc<CspStats> {
        &self.stats
    }
}

impl<S, B> Transform<S, ServiceRequest> for CspReportingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CspReportingMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CspReportingMiddlewareService {
            service: Rc::new(service),
            handler: self.handler.clone(),
            report_path: self.report_path.clone(),
            max_report_size: self.max_report_size,
            stats: self.stats.clone(),
        }))
    }
}

pub struct CspReportingMiddlewareService<S> {
    service: Rc<S>,
    handler: ViolationHandler,
    report_path: Cow<'static, str>,
    max_report_size: usize,
    stats: Arc<CspStats>,
}

impl<S, B> Service<ServiceRequest> for CspReportingMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_report_path(req.path(), &self.report_path) && req.method() == &Method::POST {
            let handler = self.handler.clone();
            let max_size = self.max_report_size;
            let stats = self.stats.clone();

            Box::pin(async move {
                let (http_req, mut payload) = req.into_parts();
                let mut body = BytesMut::new();
                while let Some(chunk) = payload.next().await {
                    let chunk = chunk?;
                    if body.len() + chunk.len() > max_size {
                        log::warn!(
                            "Rejected CSP report over {} bytes from {:?}",
                            max_size,
                            http_req.peer_addr()
                        );
                        return Err(ErrorPayloadTooLarge("CSP report too large"));
                    }
                    body.extend_from_slice(&chunk);
                }

                let reports = parse_violation_reports(&body).map_err(|e| {
                    log::warn!("Failed to process CSP violation report: {}", e);
                    ErrorBadRequest(e.to_string())
                })?;

                for report in reports {
                    log::debug!(
                        "CSP violation on {}: {} blocked {}",
                        report.document_uri,
                        report.violated_directive,
                        report.blocked_uri
                    );
                    stats.increment_violation_count();
                    handler(report);
                }

                let response = HttpResponse::NoContent().finish().map_into_right_body();
                Ok(ServiceResponse::new(http_req, response))
            })
        } else {
            let service = self.service.clone();
            Box::pin(async move {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            })
        }
    }
}

/// The configured path matches with or without its trailing slash.
fn is_report_path(path: &str, report_path: &str) -> bool {
    path == report_path || path.trim_end_matches('/') == report_path.trim_end_matches('/')
}

#[inline]
pub fn csp_reporting_middleware<F>(config: &CspConfig, handler: F) -> CspReportingMiddleware
where
    F: Fn(CspViolationReport) + Send + Sync + 'static,
{
    CspReportingMiddleware::new(config, handler)
}

#[cfg(test)]
mod tests {
    use super::is_report_path;

    #[test]
    fn report_path_matching_ignores_trailing_slash() {
        assert!(is_report_path("/csp/v1/report/", "/csp/v1/report/"));
        assert!(is_report_path("/csp/v1/report", "/csp/v1/report/"));
        assert!(!is_report_path("/csp/v1/report/extra", "/csp/v1/report/"));
    }
}
