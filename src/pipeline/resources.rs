//! Resource registry: a thin method/path/media-type resolver in front of
//! application responders.
//!
//! # Responsibilities
//! - Resolve a request to the route registered for its method and path
//! - Answer 404 when no path matches, 405 (with `Allow`) when the path
//!   matches under other methods, 406 when `Accept` excludes every media
//!   type the route produces
//! - Hand the request, captured path parameters and negotiated media type
//!   to the responder
//!
//! # Design Decisions
//! - Routes are checked in registration order; first match wins
//! - Immutable after construction, shared via `Arc` across connections

use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};

use crate::bridge::request::PseudoRequest;
use crate::bridge::response::PseudoResponse;
use crate::pipeline::stream::single;
use crate::pipeline::template::{PathParams, PathTemplate};
use crate::pipeline::{ExchangeContext, Invoker, ResponseStream};

/// Everything a responder sees about one request.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub request: PseudoRequest,
    pub params: PathParams,
    /// The route's media type selected by the request's `Accept`, if the
    /// route declares any.
    pub media_type: Option<String>,
    pub context: ExchangeContext,
}

/// Produces the response events for a resolved request.
pub trait Responder: Send + Sync + 'static {
    fn respond(&self, request: ResourceRequest) -> ResponseStream;
}

impl<F> Responder for F
where
    F: Fn(ResourceRequest) -> ResponseStream + Send + Sync + 'static,
{
    fn respond(&self, request: ResourceRequest) -> ResponseStream {
        self(request)
    }
}

struct Route {
    method: Method,
    template: PathTemplate,
    produces: Vec<String>,
    responder: Arc<dyn Responder>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("produces", &self.produces)
            .finish()
    }
}

/// An ordered set of routes implementing [`Invoker`].
#[derive(Debug, Default)]
pub struct Resources {
    routes: Vec<Route>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route that produces any media type.
    pub fn route(self, method: Method, template: &str, responder: impl Responder) -> Self {
        self.route_producing(method, template, &[], responder)
    }

    /// Register a route restricted to the given media types.
    pub fn route_producing(
        mut self,
        method: Method,
        template: &str,
        produces: &[&str],
        responder: impl Responder,
    ) -> Self {
        self.routes.push(Route {
            method,
            template: PathTemplate::new(template),
            produces: produces.iter().map(|p| p.to_ascii_lowercase()).collect(),
            responder: Arc::new(responder),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Invoker for Resources {
    fn invoke(&self, request: PseudoRequest, context: ExchangeContext) -> ResponseStream {
        let mut allowed: Vec<&Method> = Vec::new();
        let mut not_acceptable = false;

        for route in &self.routes {
            let Some(params) = route.template.matches(request.path()) else {
                continue;
            };
            if route.method != *request.method() {
                if !allowed.contains(&&route.method) {
                    allowed.push(&route.method);
                }
                continue;
            }
            let media_type = if route.produces.is_empty() {
                None
            } else {
                match negotiate(request.accept(), &route.produces) {
                    Some(media_type) => Some(media_type.to_string()),
                    None => {
                        not_acceptable = true;
                        continue;
                    }
                }
            };

            tracing::debug!(
                method = %request.method(),
                path = %request.path(),
                route = %route.template,
                "Resource matched"
            );
            return route.responder.respond(ResourceRequest {
                request,
                params,
                media_type,
                context,
            });
        }

        if not_acceptable {
            return single(PseudoResponse::error(
                StatusCode::NOT_ACCEPTABLE,
                format!("no representation of {} matches {}", request.path(), request.accept()),
            ));
        }
        if !allowed.is_empty() {
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut response = PseudoResponse::error(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{} not allowed on {}", request.method(), request.path()),
            );
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response = response.with_header(header::ALLOW, value);
            }
            return single(response);
        }
        single(PseudoResponse::error(
            StatusCode::NOT_FOUND,
            format!("no resource at {}", request.path()),
        ))
    }
}

/// Pick the first produced media type accepted by `accept`.
fn negotiate<'a>(accept: &str, produces: &'a [String]) -> Option<&'a str> {
    let ranges: Vec<String> = accept
        .split(',')
        .filter_map(|range| {
            let mut parts = range.split(';');
            let media = parts.next()?.trim().to_ascii_lowercase();
            let rejected = parts.any(|p| {
                p.trim()
                    .strip_prefix("q=")
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            });
            (!media.is_empty() && !rejected).then_some(media)
        })
        .collect();

    produces
        .iter()
        .find(|produced| ranges.iter().any(|range| media_matches(range, produced)))
        .map(String::as_str)
}

fn media_matches(range: &str, media_type: &str) -> bool {
    if range == "*/*" {
        return true;
    }
    match range.strip_suffix("/*") {
        Some(kind) => media_type
            .split_once('/')
            .is_some_and(|(t, _)| t == kind),
        None => range == media_type,
    }
}
