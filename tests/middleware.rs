mod common;

use actix_web::{test, web, App, HttpMessage, HttpRequest, HttpResponse, Result};
use actix_web_csp_policies::{
    compose_for_request, csp_middleware, CspConfigBuilder, CspExtensions, CspMiddleware,
    CspPolicyBuilder, CspReportingMiddleware, CspViolationReport, DeliveryMethod,
    InMemoryPolicyStore, PolicyId, PolicyStore, RequestNonce, SelectionCriteria,
};
use common::{base_policy, create_test_app, init_logging, page_policy};
use parking_lot::Mutex;
use std::sync::Arc;

async fn index() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().content_type("text/html").body("<p>hello</p>"))
}

async fn nonce_page(req: HttpRequest) -> Result<HttpResponse> {
    let nonce = req.csp_nonce().unwrap_or_default();
    Ok(HttpResponse::Ok()
        .content_type("text/html")
        .body(format!("<script nonce=\"{}\"></script>", nonce)))
}

async fn own_header() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok()
        .insert_header(("Content-Security-Policy", "default-src 'none'"))
        .finish())
}

fn page_handler(
    id: PolicyId,
) -> impl Fn(HttpRequest) -> futures::future::Ready<Result<HttpResponse>> + Clone {
    move |req: HttpRequest| {
        req.set_page_policy(id);
        futures::future::ready(Ok(HttpResponse::Ok().finish()))
    }
}

fn store_with(policies: Vec<actix_web_csp_policies::CspPolicy>) -> Arc<InMemoryPolicyStore> {
    Arc::new(InMemoryPolicyStore::with_policies(policies).unwrap())
}

fn header(resp: &actix_web::dev::ServiceResponse, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .map(|v| v.to_str().unwrap().to_owned())
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[actix_web::test]
    async fn test_base_policy_header_is_emitted() {
        init_logging();
        let app = test::init_service(create_test_app(store_with(vec![base_policy()]))).await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/test").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            header(&resp, "content-security-policy").as_deref(),
            Some("default-src 'self';object-src 'none';frame-ancestors 'none';")
        );
        assert!(header(&resp, "content-security-policy-report-only").is_none());
    }

    #[actix_web::test]
    async fn test_no_header_without_a_policy() {
        let config = CspConfigBuilder::new().build();
        let stats = config.stats().clone();
        let store: Arc<dyn PolicyStore> = Arc::new(InMemoryPolicyStore::new());

        let app = test::init_service(
            App::new()
                .wrap(CspMiddleware::new(store, config))
                .route("/", web::get().to(index)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(header(&resp, "content-security-policy").is_none());
        assert_eq!(stats.request_count(), 1);
        assert_eq!(stats.suppressed_count(), 1);
        assert_eq!(stats.header_emitted_count(), 0);
    }

    #[actix_web::test]
    async fn test_policy_without_enabled_directives_sends_nothing() {
        let store = store_with(vec![CspPolicyBuilder::new()
            .title("Empty")
            .base_policy(true)
            .live(true)
            .send_violation_reports(true)
            .build_unchecked()]);

        let app = test::init_service(
            App::new()
                .wrap(csp_middleware(store))
                .route("/", web::get().to(index)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(header(&resp, "content-security-policy").is_none());
        assert!(header(&resp, "content-security-policy-report-only").is_none());
    }

    #[actix_web::test]
    async fn test_report_only_policy_uses_report_only_header() {
        let store = store_with(vec![CspPolicyBuilder::new()
            .title("Trial")
            .base_policy(true)
            .live(true)
            .report_only(true)
            .send_violation_reports(true)
            .default_src("'self'")
            .build_unchecked()]);

        let app = test::init_service(
            App::new()
                .wrap(csp_middleware(store))
                .route("/", web::get().to(index)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(header(&resp, "content-security-policy").is_none());
        assert_eq!(
            header(&resp, "content-security-policy-report-only").as_deref(),
            Some("default-src 'self';report-uri /csp/v1/report/;report-to csp-endpoint;")
        );
    }

    #[actix_web::test]
    async fn test_handler_linked_page_policy_is_merged() {
        let store = Arc::new(InMemoryPolicyStore::new());
        store.insert(base_policy()).unwrap();
        let page = store.insert(page_policy("Checkout")).unwrap();

        let app = test::init_service(
            App::new()
                .wrap(csp_middleware(store))
                .route("/checkout", web::get().to(page_handler(page)))
                .route("/", web::get().to(index)),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/checkout").to_request(),
        )
        .await;
        assert_eq!(
            header(&resp, "content-security-policy").as_deref(),
            Some(
                "script-src 'self' https://cdn.example;default-src 'self';\
                 object-src 'none';frame-ancestors 'none';"
            )
        );

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(!header(&resp, "content-security-policy")
            .unwrap()
            .contains("script-src"));
    }

    #[actix_web::test]
    async fn test_page_policy_stays_on_its_page_without_a_base() {
        let store = Arc::new(InMemoryPolicyStore::new());
        store
            .insert(
                CspPolicyBuilder::new()
                    .title("About page")
                    .live(true)
                    .script_src("https://about-only.example")
                    .build_unchecked(),
            )
            .unwrap();
        let checkout = store.insert(page_policy("Checkout")).unwrap();

        let app = test::init_service(
            App::new()
                .wrap(csp_middleware(store))
                .route("/checkout", web::get().to(page_handler(checkout)))
                .route("/", web::get().to(index)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(header(&resp, "content-security-policy").is_none());

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/checkout").to_request(),
        )
        .await;
        assert_eq!(
            header(&resp, "content-security-policy").as_deref(),
            Some("script-src 'self' https://cdn.example;")
        );
    }

    #[actix_web::test]
    async fn test_draft_policies_only_served_when_not_live() {
        let draft = CspPolicyBuilder::new()
            .title("Draft")
            .base_policy(true)
            .default_src("'self'")
            .build_unchecked();

        for (live, expected) in [(true, false), (false, true)] {
            let config = CspConfigBuilder::new().with_live(live).build();
            let store: Arc<dyn PolicyStore> = store_with(vec![draft.clone()]);
            let app = test::init_service(
                App::new()
                    .wrap(CspMiddleware::new(store, config))
                    .route("/", web::get().to(index)),
            )
            .await;

            let resp =
                test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
            assert_eq!(header(&resp, "content-security-policy").is_some(), expected);
        }
    }

    #[actix_web::test]
    async fn test_nonce_reaches_handler_and_header() {
        let store: Arc<dyn PolicyStore> = store_with(vec![CspPolicyBuilder::new()
            .title("Scripts")
            .base_policy(true)
            .live(true)
            .with_directive(common::directive("script-src", "'self'").with_nonce())
            .build_unchecked()]);
        let config = CspConfigBuilder::new().with_nonce_generator(16).build();
        let stats = config.stats().clone();

        let app = test::init_service(
            App::new()
                .wrap(CspMiddleware::new(store, config))
                .route("/", web::get().to(nonce_page)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let csp = header(&resp, "content-security-policy").unwrap();
        let nonce = resp
            .request()
            .extensions()
            .get::<RequestNonce>()
            .map(|n| n.0.clone())
            .unwrap();

        assert_eq!(csp, format!("script-src 'self' 'nonce-{}';", nonce));
        let body = test::read_body(resp).await;
        assert_eq!(
            body,
            web::Bytes::from(format!("<script nonce=\"{}\"></script>", nonce))
        );
        assert_eq!(stats.nonce_generation_count(), 1);
    }

    #[actix_web::test]
    async fn test_existing_csp_header_is_left_alone() {
        let store = store_with(vec![base_policy()]);

        let app = test::init_service(
            App::new()
                .wrap(csp_middleware(store))
                .route("/", web::get().to(own_header)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(
            header(&resp, "content-security-policy").as_deref(),
            Some("default-src 'none'")
        );
    }

    #[actix_web::test]
    async fn test_repeat_requests_hit_the_cache() {
        let store: Arc<dyn PolicyStore> = store_with(vec![base_policy()]);
        let config = CspConfigBuilder::new().build();
        let stats = config.stats().clone();

        let app = test::init_service(
            App::new()
                .wrap(CspMiddleware::new(store, config))
                .route("/", web::get().to(index)),
        )
        .await;

        for _ in 0..3 {
            let resp =
                test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
            assert!(header(&resp, "content-security-policy").is_some());
        }

        assert_eq!(stats.header_emitted_count(), 3);
        assert_eq!(stats.cache_hit_count(), 2);
    }

    #[actix_web::test]
    async fn test_meta_tag_composition() {
        let store = InMemoryPolicyStore::new();
        store
            .insert(
                CspPolicyBuilder::new()
                    .title("Meta")
                    .base_policy(true)
                    .live(true)
                    .delivery_method(DeliveryMethod::MetaTag)
                    .send_violation_reports(true)
                    .default_src("'self'")
                    .build_unchecked(),
            )
            .unwrap();
        let config = CspConfigBuilder::new().build();

        let composed = compose_for_request(
            &store,
            &config,
            &SelectionCriteria::new(true, DeliveryMethod::MetaTag),
            None,
        )
        .unwrap();

        assert_eq!(composed.policy_string, "default-src 'self';");
        assert!(composed.reporting.is_none());
        assert_eq!(
            composed.meta_tag(),
            "<meta http-equiv=\"Content-Security-Policy\" content=\"default-src &#x27;self&#x27;;\">"
        );
    }

    #[actix_web::test]
    async fn test_violation_report_is_accepted() {
        init_logging();
        let received = Arc::new(Mutex::new(Vec::<CspViolationReport>::new()));
        let sink = received.clone();
        let config = CspConfigBuilder::new().build();
        let stats = config.stats().clone();

        let app = test::init_service(
            App::new()
                .wrap(CspReportingMiddleware::new(&config, move |report| {
                    sink.lock().push(report)
                }))
                .route("/", web::get().to(index)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/csp/v1/report/")
            .insert_header(("content-type", "application/csp-report"))
            .set_payload(
                r#"{"csp-report": {
                    "document-uri": "https://site.example/",
                    "blocked-uri": "https://evil.example/x.js",
                    "violated-directive": "script-src",
                    "line-number": 12
                }}"#,
            )
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].blocked_uri, "https://evil.example/x.js");
        assert_eq!(received[0].line_number, "12");
        assert_eq!(stats.violation_count(), 1);
    }

    #[actix_web::test]
    async fn test_report_path_without_trailing_slash() {
        let config = CspConfigBuilder::new().build();
        let app = test::init_service(
            App::new()
                .wrap(CspReportingMiddleware::new(&config, |_| {}))
                .route("/", web::get().to(index)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/csp/v1/report")
            .set_payload(r#"{"csp-report": {}}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn test_malformed_and_oversized_reports_are_rejected() {
        let config = CspConfigBuilder::new().build();
        let app = test::init_service(
            App::new()
                .wrap(CspReportingMiddleware::new(&config, |_| {}).with_max_report_size(64))
                .route("/", web::get().to(index)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/csp/v1/report/")
            .set_payload("not json")
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::post()
            .uri("/csp/v1/report/")
            .set_payload(format!(
                r#"{{"csp-report": {{"blocked-uri": "{}"}}}}"#,
                "x".repeat(128)
            ))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[actix_web::test]
    async fn test_report_limit_above_default_payload_limit() {
        let config = CspConfigBuilder::new()
            .with_max_report_size(1024 * 1024)
            .build();
        let received = Arc::new(Mutex::new(Vec::<CspViolationReport>::new()));
        let sink = received.clone();
        let app = test::init_service(
            App::new()
                .wrap(CspReportingMiddleware::new(&config, move |report| {
                    sink.lock().push(report)
                }))
                .route("/", web::get().to(index)),
        )
        .await;

        let sample = "x".repeat(300 * 1024);
        let req = test::TestRequest::post()
            .uri("/csp/v1/report/")
            .set_payload(format!(
                r#"{{"csp-report": {{"original-policy": "{}"}}}}"#,
                sample
            ))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(received.lock()[0].original_policy.len(), sample.len());
    }

    #[actix_web::test]
    async fn test_other_requests_pass_through_reporting() {
        let config = CspConfigBuilder::new().build();
        let app = test::init_service(
            App::new()
                .wrap(CspReportingMiddleware::new(&config, |_| {}))
                .route("/", web::get().to(index))
                .route("/csp/v1/report/", web::get().to(index)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/csp/v1/report/").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
