use std::sync::Arc;

use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{error, info, warn};

use crate::relay::{CloseReason, ConnectionHandle, MessageRouter, SendError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub username: Option<String>,
}

/// Query values are whitespace-stripped and lowercased before use.
fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

// Outbound text pushed to the socket.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Outbound(String);

// Outbound binary pushed to the socket.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundBinary(Vec<u8>);

// Liveness probe requested by the heartbeat monitor.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Probe;

// Server-initiated close.
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct CloseSession(CloseReason);

/// ConnectionHandle over the session actor address.
///
/// Sends enqueue on the actor mailbox, so writes to one socket are
/// serialized by the single actor that owns it, and nothing here blocks.
struct WsConnection {
    addr: Addr<WsSession>,
}

impl ConnectionHandle for WsConnection {
    fn send_text(&self, frame: String) -> Result<(), SendError> {
        self.addr
            .try_send(Outbound(frame))
            .map_err(|e| SendError(e.to_string()))
    }

    fn send_binary(&self, payload: Vec<u8>) -> Result<(), SendError> {
        self.addr
            .try_send(OutboundBinary(payload))
            .map_err(|e| SendError(e.to_string()))
    }

    fn send_probe(&self) -> Result<(), SendError> {
        self.addr
            .try_send(Probe)
            .map_err(|e| SendError(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.addr.connected()
    }

    fn close(&self, reason: CloseReason) {
        let _ = self.addr.try_send(CloseSession(reason));
    }
}

fn ws_close_reason(reason: CloseReason) -> ws::CloseReason {
    let code = match reason {
        CloseReason::Normal => ws::CloseCode::Normal,
        CloseReason::TransportError => ws::CloseCode::Error,
        // Matches the original wire behavior for liveness timeouts.
        CloseReason::NotReliable => ws::CloseCode::Other(4500),
    };
    ws::CloseReason {
        code,
        description: Some(reason.description().to_string()),
    }
}

// Inbound frames queued for the per-connection worker.
enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

/// One actor per connection; owns the socket end to end.
struct WsSession {
    key: String,
    router: Arc<MessageRouter>,
    inbound: Option<UnboundedSender<Inbound>>,
}

impl WsSession {
    fn new(key: String, router: Arc<MessageRouter>) -> Self {
        Self {
            key,
            router,
            inbound: None,
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let handle: Arc<dyn ConnectionHandle> = Arc::new(WsConnection {
            addr: ctx.address(),
        });

        // One worker per connection: frames are processed in arrival order,
        // parallel across connections, sequential within one.
        let (tx, mut rx) = unbounded_channel::<Inbound>();
        self.inbound = Some(tx);

        let router = self.router.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            router.establish(key.clone(), handle).await;
            while let Some(frame) = rx.recv().await {
                match frame {
                    Inbound::Text(text) => router.handle_frame(&key, &text).await,
                    Inbound::Binary(payload) => router.handle_binary(&key, &payload).await,
                }
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Dropping the sender ends the worker once its queue drains.
        self.inbound.take();

        let router = self.router.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            router.disconnect(&key).await;
        });
    }
}

impl Handler<Outbound> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<OutboundBinary> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundBinary, ctx: &mut Self::Context) {
        ctx.binary(msg.0);
    }
}

impl Handler<Probe> for WsSession {
    type Result = ();

    fn handle(&mut self, _msg: Probe, ctx: &mut Self::Context) {
        ctx.ping(b"ping");
    }
}

impl Handler<CloseSession> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: CloseSession, ctx: &mut Self::Context) {
        ctx.close(Some(ws_close_reason(msg.0)));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                ctx.pong(&payload);
                // Any control traffic counts as liveness.
                let router = self.router.clone();
                let key = self.key.clone();
                tokio::spawn(async move { router.record_pong(&key).await });
            }
            Ok(ws::Message::Pong(_)) => {
                let router = self.router.clone();
                let key = self.key.clone();
                tokio::spawn(async move { router.record_pong(&key).await });
            }
            Ok(ws::Message::Text(text)) => {
                if let Some(tx) = &self.inbound {
                    if tx.send(Inbound::Text(text.to_string())).is_err() {
                        warn!(key = %self.key, "inbound worker gone, dropping frame");
                    }
                }
            }
            Ok(ws::Message::Binary(payload)) => {
                if let Some(tx) = &self.inbound {
                    if tx.send(Inbound::Binary(payload.to_vec())).is_err() {
                        warn!(key = %self.key, "inbound worker gone, dropping frame");
                    }
                }
            }
            Ok(ws::Message::Close(reason)) => {
                info!(key = %self.key, ?reason, "peer closed connection");
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                error!(key = %self.key, error = %e, "websocket transport error");
                // Best-effort close; teardown runs from stopped().
                ctx.close(Some(ws_close_reason(CloseReason::TransportError)));
                ctx.stop();
            }
        }
    }
}

#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let display_name = query
        .username
        .as_deref()
        .map(normalize)
        .unwrap_or_default();
    let key = state.router.assign_key(&display_name);

    ws::start(WsSession::new(key, state.router.clone()), &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_whitespace_and_lowercases() {
        assert_eq!(normalize(" Ali Ce \t"), "alice");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("BOB"), "bob");
    }

    #[test]
    fn close_codes_match_wire_contract() {
        assert_eq!(
            ws_close_reason(CloseReason::Normal).code,
            ws::CloseCode::Normal
        );
        assert_eq!(
            ws_close_reason(CloseReason::TransportError).code,
            ws::CloseCode::Error
        );
        let not_reliable = ws_close_reason(CloseReason::NotReliable);
        assert_eq!(not_reliable.code, ws::CloseCode::Other(4500));
        assert_eq!(not_reliable.description.as_deref(), Some("session not reliable"));
    }
}
