//! # Inbound Mailbox
//!
//! HTTP endpoint through which other processes deliver envelopes:
//!
//! - `POST /mailbox` with a JSON [`WireEnvelope`] body.
//! - `200` when the envelope was queued on the local World.
//! - `400` when the body cannot be decoded or the receiver lives on another process.
//! - `413` when the body exceeds [`MAX_ENVELOPE_BYTES`].
//! - `503` once the World has stopped.

use crate::framework::{ErrorKind, MessageRegistry, RuntimeError, WireEnvelope, World};
use hyper::body::HttpBody as _;
use hyper::server::conn::AddrIncoming;
use hyper::server::Builder;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body as HttpBody, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Largest envelope body the mailbox buffers.
pub const MAX_ENVELOPE_BYTES: usize = 4 * 1024 * 1024;

struct Mailbox {
    world: World,
    registry: Arc<MessageRegistry>,
}

impl Mailbox {
    fn accept(&self, bytes: &[u8]) -> Result<(), RuntimeError> {
        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        if wire.receiver.process_id() != self.world.process().id() {
            return Err(RuntimeError::MalformedEnvelope(format!(
                "wrong server id for receiver {}",
                wire.receiver
            )));
        }
        let envelope = wire.decode(&self.registry)?;
        debug!(
            receiver = %envelope.receiver(),
            request_id = envelope.request_id(),
            message = envelope.body().type_name(),
            "Envelope received"
        );
        self.world.receive(envelope)
    }
}

/// Running `/mailbox` endpoint. Stops when its World shuts down.
pub struct MailboxServer {
    local_addr: SocketAddr,
    task: JoinHandle<Result<(), hyper::Error>>,
}

impl MailboxServer {
    /// Binds `addr` (port 0 picks a free port) and starts serving on the current runtime.
    pub fn bind(
        addr: SocketAddr,
        world: World,
        registry: Arc<MessageRegistry>,
    ) -> Result<Self, hyper::Error> {
        Self::serve(Server::try_bind(&addr)?, world, registry)
    }

    /// Serves on an already bound listener, for callers that need the port before the World.
    pub fn from_listener(
        listener: std::net::TcpListener,
        world: World,
        registry: Arc<MessageRegistry>,
    ) -> Result<Self, hyper::Error> {
        Self::serve(Server::from_tcp(listener)?, world, registry)
    }

    fn serve(
        builder: Builder<AddrIncoming>,
        world: World,
        registry: Arc<MessageRegistry>,
    ) -> Result<Self, hyper::Error> {
        let token = world.token();
        let mailbox = Arc::new(Mailbox { world, registry });

        let make_svc = make_service_fn(move |_conn| {
            let mailbox = Arc::clone(&mailbox);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let mailbox = Arc::clone(&mailbox);
                    handle_request(req, mailbox)
                }))
            }
        });

        let server = builder.serve(make_svc);
        let local_addr = server.local_addr();
        let task = tokio::spawn(
            server.with_graceful_shutdown(async move { token.cancelled().await }),
        );
        info!(%local_addr, "Mailbox listening");

        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The base URL other processes should post to.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Waits for the server to finish after its World stopped.
    pub async fn join(self) {
        match self.task.await {
            Ok(Ok(())) => info!(local_addr = %self.local_addr, "Mailbox closed"),
            Ok(Err(e)) => error!(error = %e, "Mailbox server failed"),
            Err(e) => error!(error = %e, "Mailbox task failed"),
        }
    }
}

fn reply(status: StatusCode, text: impl Into<String>) -> Response<HttpBody> {
    let mut response = Response::new(HttpBody::from(text.into()));
    *response.status_mut() = status;
    response
}

async fn handle_request(
    req: Request<HttpBody>,
    mailbox: Arc<Mailbox>,
) -> Result<Response<HttpBody>, Infallible> {
    if req.uri().path() != "/mailbox" {
        return Ok(reply(StatusCode::NOT_FOUND, "Not found"));
    }
    if req.method() != Method::POST {
        return Ok(reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }

    let bytes = match read_body(req.into_body(), MAX_ENVELOPE_BYTES).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(limit = MAX_ENVELOPE_BYTES, "Mailbox body too large");
            return Ok(reply(StatusCode::PAYLOAD_TOO_LARGE, "Envelope too large"));
        }
        Err(e) => {
            warn!(error = %e, "Cannot read mailbox body");
            return Ok(reply(StatusCode::BAD_REQUEST, e.to_string()));
        }
    };

    match mailbox.accept(&bytes) {
        Ok(()) => Ok(reply(StatusCode::OK, "OK")),
        Err(e) if e.kind() == ErrorKind::Lifecycle => {
            Ok(reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
        Err(e) => {
            warn!(error = %e, "Envelope rejected");
            Ok(reply(StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

/// Buffers `body`, giving up with `None` as soon as it grows past `limit` bytes.
async fn read_body(
    mut body: HttpBody,
    limit: usize,
) -> Result<Option<Vec<u8>>, hyper::Error> {
    if body.size_hint().lower() > limit as u64 {
        return Ok(None);
    }
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if bytes.len() + chunk.len() > limit {
            return Ok(None);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(Some(bytes))
}
