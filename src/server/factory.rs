use actix_web::web::Data;
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};

use crate::audit::factory::AuditFactory;
use crate::audit::UnionAuditSink;
use crate::decision::{DecisionEngine, FallbackPolicy};
use crate::idp::factory::{IdpFactory, ServerIdentityProvider};
use crate::rebac::factory::RebacFactory;
use crate::rebac::OpenFgaClient;

use super::boundary::AuthBoundary;
use super::config::ServerConfig;
use super::restful::{RestfulContext, RestfulServer};
use super::target::TargetResolver;

pub type ServerBoundary = AuthBoundary<ServerIdentityProvider, OpenFgaClient, UnionAuditSink>;

pub type ServerRestful = RestfulServer<ServerIdentityProvider, OpenFgaClient, UnionAuditSink>;

pub struct ServerFactory {
    cfg: ServerConfig,
}

impl ServerFactory {
    pub fn new(cfg: ServerConfig) -> Self {
        Self { cfg }
    }

    pub fn build_server(&self) -> Result<ServerRestful> {
        let ssl = self.build_ssl()?;
        let boundary = self.build_boundary()?;
        let ctx = Data::new(RestfulContext::new(&self.cfg.target.prefix));

        let mut srv = RestfulServer::new(self.cfg.bind.clone(), ssl, ctx, Data::new(boundary));
        if self.cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(self.cfg.keep_alive_secs);
        }
        if self.cfg.workers > 0 {
            srv.set_workers(self.cfg.workers);
        }

        Ok(srv)
    }

    pub fn build_ssl(&self) -> Result<Option<SslAcceptorBuilder>> {
        if !self.cfg.ssl {
            return Ok(None);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&self.cfg.key_path, SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&self.cfg.cert_path)
            .context("load ssl cert file")?;

        Ok(Some(builder))
    }

    /// Builds every long-lived collaborator of the boundary. Called once at
    /// startup; all workers share the result.
    pub fn build_boundary(&self) -> Result<ServerBoundary> {
        let idp = IdpFactory::new()
            .build_identity_provider(&self.cfg.idp)
            .context("init identity provider")?;

        let authz = RebacFactory::new()
            .build_authorization_client(&self.cfg.rebac)
            .context("init authorization client")?;

        let audit = AuditFactory::new()
            .build_audit_sink(&self.cfg.audit)
            .context("init audit sink")?;

        let policy = self.build_policy();
        let engine = DecisionEngine::new(idp, authz, audit, policy);
        let resolver = TargetResolver::new(&self.cfg.target);

        Ok(AuthBoundary::new(engine, resolver))
    }

    pub fn build_policy(&self) -> FallbackPolicy {
        let policy = FallbackPolicy::new(self.cfg.environment, self.cfg.allow_fallback);
        if self.cfg.allow_fallback && self.cfg.environment.is_production() {
            warn!(
                "allow_fallback is ignored in production, requests are denied while the \
                 authorization backend is unavailable"
            );
        }
        if policy.is_fallback_effective() {
            warn!(
                "Fallback is enabled, requests are ALLOWED while the authorization backend \
                 is unavailable"
            );
        } else {
            info!(
                "Fallback is disabled, requests are denied while the authorization backend \
                 is unavailable"
            );
        }
        policy
    }
}
