use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::middleware::from_fn;
use actix_web::web::{self, Data};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use crate::audit::AuditSink;
use crate::idp::IdentityProvider;
use crate::rebac::AuthorizationClient;

use super::boundary::AuthBoundary;
use super::handlers::api::ApiHandler;
use super::handlers::healthz::HealthzHandler;
use super::handlers::verify::VerifyHandler;
use super::handlers::Handler;
use super::middleware::{authenticate, authenticate_forwarded};
use super::response::CommonResponse;

pub struct RestfulServer<I, A, S>
where
    I: IdentityProvider + 'static,
    A: AuthorizationClient + 'static,
    S: AuditSink + 'static,
{
    ssl: Option<SslAcceptorBuilder>,
    ctx: Data<RestfulContext>,
    boundary: Data<AuthBoundary<I, A, S>>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,
}

pub struct RestfulContext {
    /// Where the protected api is mounted. Matches the prefix the target
    /// resolver reads objects below.
    pub api_prefix: String,

    pub api_handler: ApiHandler,
    pub healthz_handler: HealthzHandler,
    pub verify_handler: VerifyHandler,
}

impl RestfulContext {
    pub fn new(api_prefix: &str) -> Self {
        Self {
            api_prefix: api_prefix.to_string(),
            api_handler: ApiHandler::new(),
            healthz_handler: HealthzHandler::new(),
            verify_handler: VerifyHandler::new(),
        }
    }
}

pub const HEALTHZ_PATH: &str = "/healthz";
pub const VERIFY_PATH: &str = "/verify";

impl<I, A, S> RestfulServer<I, A, S>
where
    I: IdentityProvider + 'static,
    A: AuthorizationClient + 'static,
    S: AuditSink + 'static,
{
    pub fn new(
        bind: String,
        ssl: Option<SslAcceptorBuilder>,
        ctx: Data<RestfulContext>,
        boundary: Data<AuthBoundary<I, A, S>>,
    ) -> Self {
        Self {
            ssl,
            ctx,
            boundary,
            keep_alive_secs: None,
            workers: None,
            bind,
        }
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let boundary = self.boundary.clone();
        let mut srv = HttpServer::new(move || {
            App::new().configure(configure(ctx.clone(), boundary.clone()))
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!(
                "Using HTTP (without SSL). Bearer tokens travel in clear text, \
                 DO NOT USE IN PRODUCTION"
            );
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }
}

/// Registers every route. `/healthz` is open; the api prefix and `/verify` sit
/// behind the boundary middleware.
pub fn configure<I, A, S>(
    ctx: Data<RestfulContext>,
    boundary: Data<AuthBoundary<I, A, S>>,
) -> impl FnOnce(&mut web::ServiceConfig)
where
    I: IdentityProvider + 'static,
    A: AuthorizationClient + 'static,
    S: AuditSink + 'static,
{
    let scope_path = match ctx.api_prefix.as_str() {
        "/" => String::new(),
        prefix => prefix.to_string(),
    };
    move |cfg| {
        cfg.app_data(ctx)
            .app_data(boundary)
            .service(web::resource(HEALTHZ_PATH).route(web::get().to(handle_healthz)))
            .service(
                web::resource(VERIFY_PATH)
                    .wrap(from_fn(authenticate_forwarded::<I, A, S, _>))
                    .route(web::route().to(handle_verify)),
            )
            .service(
                web::scope(&scope_path)
                    .wrap(from_fn(authenticate::<I, A, S, _>))
                    .default_service(web::to(handle_api)),
            )
            .default_service(web::to(default_handler));
    }
}

async fn handle_api(req: HttpRequest, ctx: Data<RestfulContext>) -> HttpResponse {
    let path = parse_path(&ctx.api_prefix, &req);
    ctx.api_handler.handle(&path, req).into()
}

async fn handle_healthz(req: HttpRequest, ctx: Data<RestfulContext>) -> HttpResponse {
    ctx.healthz_handler.handle("", req).into()
}

async fn handle_verify(req: HttpRequest, ctx: Data<RestfulContext>) -> HttpResponse {
    ctx.verify_handler.handle("", req).into()
}

async fn default_handler(req: HttpRequest) -> HttpResponse {
    let path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();
    let message = format!("No route to {method} {path}");
    let ret = CommonResponse {
        code: StatusCode::NOT_FOUND.into(),
        message: Some(message),
    };
    HttpResponse::NotFound().json(ret)
}

fn parse_path(route: &str, req: &HttpRequest) -> String {
    let path = req.uri().path();
    let path = path.strip_prefix(route).unwrap_or(path);
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use actix_web::http::header::AUTHORIZATION;
    use actix_web::test;
    use serde_json::{json, Value};

    use crate::audit::tests::MemoryAuditSink;
    use crate::config::{CommonConfig, PathSet};
    use crate::decision::tests::{MockAuthorizationClient, MockBackend, MockIdentityProvider};
    use crate::decision::{DecisionEngine, Environment, FallbackPolicy, ReasonCode};
    use crate::server::handlers::verify::AUTH_PRINCIPAL_HEADER;
    use crate::server::target::{TargetConfig, TargetResolver};

    use super::*;

    type TestBoundary =
        AuthBoundary<MockIdentityProvider, MockAuthorizationClient, MemoryAuditSink>;

    fn new_boundary(backend: MockBackend) -> Data<TestBoundary> {
        let engine = DecisionEngine::new(
            MockIdentityProvider::new(),
            MockAuthorizationClient::new(backend),
            MemoryAuditSink::new(),
            FallbackPolicy::new(Environment::Production, false),
        );
        let resolver = TargetResolver::new(&TargetConfig::default());
        Data::new(AuthBoundary::new(engine, resolver))
    }

    macro_rules! init_app {
        ($boundary:expr) => {
            test::init_service(
                App::new().configure(configure(
                    Data::new(RestfulContext::new("/api")),
                    $boundary.clone(),
                )),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_healthz_is_open() {
        let boundary = new_boundary(MockBackend::Deny);
        let app = init_app!(boundary);

        let req = test::TestRequest::get().uri("/healthz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));

        assert!(boundary.engine().audit_sink().records().is_empty());
    }

    #[actix_web::test]
    async fn test_whoami() {
        let boundary = new_boundary(MockBackend::Allow);
        let app = init_app!(boundary);

        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header((AUTHORIZATION, "Bearer alice"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["name"], "user:alice");
        assert_eq!(body["data"]["raw_identifier"], "alice");

        let req = test::TestRequest::get().uri("/api/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let records = boundary.engine().audit_sink().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reason, ReasonCode::BackendAllowed);
        assert_eq!(records[0].object, "service:authgate");
        assert_eq!(records[1].reason, ReasonCode::CredentialMissing);
    }

    #[actix_web::test]
    async fn test_api_not_found_after_authorization() {
        let boundary = new_boundary(MockBackend::Allow);
        let app = init_app!(boundary);

        let req = test::TestRequest::post()
            .uri("/api/document/roadmap")
            .insert_header((AUTHORIZATION, "Bearer alice"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let records = boundary.engine().audit_sink().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relation, "editor");
        assert_eq!(records[0].object, "document:roadmap");
    }

    #[actix_web::test]
    async fn test_denied_api_hides_routes() {
        let boundary = new_boundary(MockBackend::Deny);
        let app = init_app!(boundary);

        for uri in ["/api/whoami", "/api/document/roadmap", "/api/no/such/route"] {
            let req = test::TestRequest::get()
                .uri(uri)
                .insert_header((AUTHORIZATION, "Bearer alice"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body, json!({"code": 403, "message": "Access denied"}));
        }
    }

    #[actix_web::test]
    async fn test_verify() {
        let boundary = new_boundary(MockBackend::Allow);
        let app = init_app!(boundary);

        let req = test::TestRequest::get()
            .uri("/verify")
            .insert_header((AUTHORIZATION, "Bearer alice"))
            .insert_header(("X-Forwarded-Method", "DELETE"))
            .insert_header(("X-Forwarded-Uri", "/api/document/roadmap"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(AUTH_PRINCIPAL_HEADER).unwrap(),
            "user:alice"
        );

        let records = boundary.engine().audit_sink().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relation, "owner");
        assert_eq!(records[0].object, "document:roadmap");
    }

    #[actix_web::test]
    async fn test_custom_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let ps = PathSet::new_test(dir.path());
        let mut cfg = TargetConfig::default();
        cfg.prefix = String::from("/v1/");
        cfg.complete(&ps).unwrap();

        let engine = DecisionEngine::new(
            MockIdentityProvider::new(),
            MockAuthorizationClient::new(MockBackend::Allow),
            MemoryAuditSink::new(),
            FallbackPolicy::new(Environment::Production, false),
        );
        let boundary = Data::new(AuthBoundary::new(engine, TargetResolver::new(&cfg)));
        let app = test::init_service(App::new().configure(configure(
            Data::new(RestfulContext::new(&cfg.prefix)),
            boundary.clone(),
        )))
        .await;

        let req = test::TestRequest::get()
            .uri("/v1/document/roadmap")
            .insert_header((AUTHORIZATION, "Bearer alice"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/v1/whoami")
            .insert_header((AUTHORIZATION, "Bearer alice"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // The old prefix is no longer served at all
        let req = test::TestRequest::get()
            .uri("/api/document/roadmap")
            .insert_header((AUTHORIZATION, "Bearer alice"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let records = boundary.engine().audit_sink().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].object, "document:roadmap");
        assert_eq!(records[1].object, "service:authgate");
    }

    #[actix_web::test]
    async fn test_default_handler() {
        let boundary = new_boundary(MockBackend::Allow);
        let app = init_app!(boundary);

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(boundary.engine().audit_sink().records().is_empty());
    }
}
