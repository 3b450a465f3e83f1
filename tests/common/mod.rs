#![allow(dead_code)]

use actix_web::{web, App, HttpResponse};
use actix_web_csp_policies::{
    csp_middleware, CspLevel, CspPolicy, CspPolicyBuilder, Directive, PolicyStore,
};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Base policy as a site would usually configure it.
pub fn base_policy() -> CspPolicy {
    CspPolicyBuilder::new()
        .title("Base")
        .base_policy(true)
        .live(true)
        .default_src("'self'")
        .object_src("'none'")
        .frame_ancestors("'none'")
        .build()
        .expect("base policy is valid")
}

pub fn page_policy(title: &str) -> CspPolicy {
    CspPolicyBuilder::new()
        .title(title)
        .live(true)
        .script_src("'self' https://cdn.example")
        .build()
        .expect("page policy is valid")
}

pub fn reporting_policy(level: CspLevel) -> CspPolicy {
    CspPolicyBuilder::new()
        .default_src("'self'")
        .send_violation_reports(true)
        .minimum_csp_level(level)
        .build_unchecked()
}

pub fn directive(key: &'static str, value: &str) -> Directive {
    Directive::new(key).with_value(value)
}

pub async fn test_handler() -> HttpResponse {
    HttpResponse::Ok().body("Test response")
}

/// App with the header middleware in front of a single `/test` route.
pub fn create_test_app(
    store: Arc<dyn PolicyStore>,
) -> App<
    impl actix_service::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(csp_middleware(store))
        .route("/test", web::get().to(test_handler))
}
