//! HTTP boundary for the link registry
//!
//! Serves the public redirect endpoint, which is the only writer of scan
//! events, plus a small JSON management API. Registry calls run on the
//! blocking pool under a per-request deadline.

use crate::config::{QrtistConfig, RegistryOptions};
use crate::error::{Error, Result};
use crate::gate::{FreemiumGate, ProStatus};
use crate::output;
use crate::registry::Registry;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, ResponseError, web};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Shared state handed to every handler
pub struct AppState {
    registry: Arc<Registry>,
    status: ProStatus,
    gate: FreemiumGate,
    links: RegistryOptions,
    timeout: Duration,
}

impl AppState {
    /// Bundle the registry, the pro flag and the relevant configuration.
    pub fn new(registry: Arc<Registry>, status: ProStatus, config: &QrtistConfig) -> Self {
        Self {
            registry,
            status,
            gate: FreemiumGate::new(config.registry.visible_limit),
            links: config.registry.clone(),
            timeout: config.server.request_timeout(),
        }
    }

    /// Run a registry operation on the blocking pool under the request deadline.
    ///
    /// A timed-out operation is not cancelled; it may still commit.
    async fn with_registry<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Registry) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let task = web::block(move || op(&registry));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(blocking)) => Err(Error::Other(format!("registry task failed: {blocking}"))),
            Err(_) => Err(Error::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if self.is_client_error() {
            debug!(error = %self, "rejected request");
        } else {
            error!(error = %self, status = status.as_u16(), "request failed");
        }
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .json(json!({ "error": message }))
    }
}

/// Register every route on an actix `App`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/s/{id}").route(web::get().to(redirect)))
        .service(
            web::resource("/api/links")
                .route(web::get().to(list_links))
                .route(web::post().to(create_link)),
        )
        .service(
            web::resource("/api/links/{id}")
                .route(web::get().to(link_detail))
                .route(web::delete().to(delete_link)),
        )
        .service(web::resource("/api/purchase").route(web::post().to(confirm_purchase)));
}

/// Bound HTTP server
pub struct Server {
    inner: actix_web::dev::Server,
    addrs: Vec<SocketAddr>,
}

impl Server {
    /// Bind to `addr` (e.g. `127.0.0.1:9233`) and start the workers.
    ///
    /// Must be called from within an actix system.
    pub fn bind(addr: &str, state: AppState) -> Result<Self> {
        let data = web::Data::new(state);
        let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
            .bind(addr)
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to bind {addr}: {e}"),
                ))
            })?;
        let addrs = server.addrs();
        info!(?addrs, "Serving short links");

        Ok(Self {
            inner: server.run(),
            addrs,
        })
    }

    /// First address the listener is bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addrs.first().copied()
    }

    /// Serve until the process receives a shutdown signal.
    pub async fn run(self) -> Result<()> {
        self.inner.await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct CreateLinkBody {
    url: Option<String>,
}

async fn redirect(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let target = state
        .with_registry(move |registry| registry.resolve_link(&id, user_agent.as_deref()))
        .await?;
    redirect_to(&target)
}

fn redirect_to(target: &str) -> Result<HttpResponse> {
    let location = HeaderValue::from_str(target)
        .map_err(|_| Error::Storage("stored target is not a valid Location value".to_string()))?;
    debug!(location = target, "Redirecting");
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish())
}

async fn create_link(body: web::Bytes, state: web::Data<AppState>) -> Result<HttpResponse> {
    let body: CreateLinkBody = serde_json::from_slice(&body)
        .map_err(|e| Error::InvalidInput(format!("invalid JSON body: {e}")))?;
    let url = body
        .url
        .ok_or_else(|| Error::InvalidInput("missing field 'url'".to_string()))?;

    let link = state
        .with_registry(move |registry| registry.create_link(&url))
        .await?;
    Ok(HttpResponse::Created().json(output::link_value(&link, &state.links)))
}

async fn list_links(state: web::Data<AppState>) -> Result<HttpResponse> {
    let status = state.status.clone();
    let links = state
        .with_registry(move |registry| {
            registry.refresh_pro_status(&status)?;
            registry.list_links()
        })
        .await?;

    let listing = state.gate.apply(links, &state.status);
    let rendered = output::render_listing(&listing, state.status.is_pro(), &state.links);
    Ok(HttpResponse::Ok().json(rendered.json))
}

async fn link_detail(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let id = path.into_inner();
    let detail = state
        .with_registry(move |registry| registry.get_detail(&id))
        .await?;
    Ok(HttpResponse::Ok().json(output::render_detail(&detail, &state.links).json))
}

async fn delete_link(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let id = path.into_inner();
    let owned = id.clone();
    let removed = state
        .with_registry(move |registry| registry.delete_link(&owned))
        .await?;
    if removed {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(Error::NotFound(id))
    }
}

async fn confirm_purchase(state: web::Data<AppState>) -> Result<HttpResponse> {
    let status = state.status.clone();
    let changed = state
        .with_registry(move |registry| registry.confirm_purchase(&status))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "is_pro": true, "changed": changed })))
}
