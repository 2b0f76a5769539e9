// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-connection driving loop: decode frames off a transport,
//! dispatch them against the [`Hub`], and push outgoing messages (direct
//! replies and document broadcasts alike) back out over the same socket.
//! Generic over the transport for the same reason
//! `screenplay_net::FramedConnection` is — production runs it over a
//! `TlsStream<TcpStream>`, tests run it over `tokio::io::duplex`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use screenplay_net::FramedConnection;
use screenplay_wire::{
    AckPatch, ErrorFulfillingServerRequest, FileId, IdOnly, LoginResult, Message, UserPublic,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::document::{ConnHandle, ConnId, RealTimeDocument};
use crate::hub::Hub;
use crate::liveness::{LivenessAction, LivenessTracker, PROBE_INTERVAL};

/// How many outgoing messages (direct replies plus document broadcasts)
/// may be queued for one connection before it backpressures.
const OUTBOX_DEPTH: usize = 256;

/// Drive one connection end to end: accept messages until the peer sends
/// `CLOSE`, disconnects, or goes quiet past the liveness timeout, then
/// tear down its document memberships. Logs and returns rather than
/// panicking on any protocol or I/O failure — a single misbehaving
/// connection never takes the rest of the server down with it.
pub async fn serve_connection<T>(stream: T, hub: Arc<Hub>)
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let mut conn = FramedConnection::new(stream);
    let conn_id = hub.alloc_conn_id();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOX_DEPTH);
    let mut user = UserPublic {
        username: format!("conn-{conn_id}"),
        visible_name: format!("conn-{conn_id}"),
    };
    let mut joined: HashMap<FileId, Arc<RealTimeDocument>> = HashMap::new();
    let mut liveness = LivenessTracker::new(Instant::now());
    let mut probe_tick = interval(PROBE_INTERVAL);

    loop {
        tokio::select! {
            received = conn.recv() => {
                let message = match received {
                    Ok(message) => message,
                    Err(err) => {
                        tracing::warn!(conn_id, ?err, "connection error, closing");
                        break;
                    }
                };
                if !handle_message(message, &mut conn, &hub, conn_id, &mut user, &mut joined, &mut liveness, &tx).await {
                    break;
                }
            }
            Some(out) = rx.recv() => {
                if conn.send(&out).await.is_err() {
                    break;
                }
            }
            _ = probe_tick.tick() => {
                match liveness.tick(Instant::now()) {
                    LivenessAction::Idle => {}
                    LivenessAction::SendProbe => {
                        if conn.send(&Message::AreUAlive).await.is_err() {
                            break;
                        }
                    }
                    LivenessAction::Close => {
                        tracing::warn!(conn_id, "liveness timeout, closing");
                        break;
                    }
                }
            }
        }
    }

    cleanup_session(&hub, conn_id, &joined).await;
    conn.close();
}

/// Leave every document this connection was editing and drop any that are
/// now empty, saving each one as it empties out.
async fn cleanup_session(hub: &Hub, conn_id: ConnId, joined: &HashMap<FileId, Arc<RealTimeDocument>>) {
    for (file_id, doc) in joined {
        if let Some((_, is_last)) = doc.leave_client(conn_id).await {
            if is_last {
                if let Err(err) = doc.save().await {
                    tracing::warn!(conn_id, ?err, file_id = %file_id, "failed to save document on last editor leaving");
                }
            }
        }
        hub.remove_document_if_empty(file_id).await;
    }
}

/// Handle one decoded message. Returns `false` if the connection should
/// close.
#[allow(clippy::too_many_arguments)]
async fn handle_message<T>(
    message: Message,
    conn: &mut FramedConnection<T>,
    hub: &Arc<Hub>,
    conn_id: ConnId,
    user: &mut UserPublic,
    joined: &mut HashMap<FileId, Arc<RealTimeDocument>>,
    liveness: &mut LivenessTracker,
    tx: &mpsc::Sender<Message>,
) -> bool
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    match message {
        Message::Close => return false,
        Message::Ping => {
            let _ = conn.send(&Message::Pong).await;
        }
        Message::IAmAlive => {
            liveness.on_alive(Instant::now());
        }
        Message::AreUAlive => {
            let _ = conn.send(&Message::IAmAlive).await;
        }
        Message::Login(req) => {
            let result = match hub.auth().authenticate(&req) {
                Ok(public) => {
                    *user = public.clone();
                    LoginResult::Ok { projects: Vec::new(), user: public }
                }
                Err(code) => LoginResult::Err(code),
            };
            let _ = conn.send(&Message::LoginResult(result)).await;
        }
        Message::JoinDoc(IdOnly { id }) => {
            let doc = hub.get_or_create_document(id, String::new()).await;
            let handle = ConnHandle {
                id: conn_id,
                user: user.clone(),
                tx: tx.clone(),
            };
            let snapshot = doc.join_client(handle).await;
            joined.insert(id, doc);
            let _ = conn.send(&Message::SyncDoc(snapshot)).await;
        }
        Message::LeaveDoc(IdOnly { id }) => {
            if let Some(doc) = joined.remove(&id) {
                if let Some((_, is_last)) = doc.leave_client(conn_id).await {
                    if is_last {
                        let _ = doc.save().await;
                    }
                }
                hub.remove_document_if_empty(&id).await;
            }
        }
        Message::ScriptPatch(upload) => {
            let Some(doc) = joined.get(&upload.file_id) else {
                let _ = conn
                    .send(&Message::ErrorFulfillingProjectRequest(ErrorFulfillingServerRequest {
                        message: "not an editor of this document".to_string(),
                    }))
                    .await;
                return true;
            };
            match doc
                .upload_patch(conn_id, upload.patch, upload.branch_id, upload.document_timestamp)
                .await
            {
                Ok(ack) => {
                    let _ = conn
                        .send(&Message::ScriptPatchAck(AckPatch {
                            file_id: upload.file_id,
                            patch: ack,
                        }))
                        .await;
                }
                Err(err) => {
                    tracing::warn!(conn_id, ?err, "patch upload rejected");
                    let _ = conn
                        .send(&Message::ErrorFulfillingProjectRequest(ErrorFulfillingServerRequest {
                            message: err.to_string(),
                        }))
                        .await;
                }
            }
        }
        Message::Pong
        | Message::LoginResult(_)
        | Message::ErrorFulfillingServerRequest(_)
        | Message::ErrorFulfillingProjectRequest(_)
        | Message::CreatedProject(_)
        | Message::DeletedProject(_)
        | Message::SyncProject(_)
        | Message::OpenedProject(_)
        | Message::RenamedProject(_)
        | Message::SyncDoc(_)
        | Message::JoinedDoc(_)
        | Message::LeftDoc(_)
        | Message::CreatedDoc(_)
        | Message::DeletedDoc(_)
        | Message::CreatedFolder(_)
        | Message::ScriptPatchAck(_)
        | Message::ScriptPatched(_) => {
            // Server-to-client-only messages; a client sending one of
            // these is a protocol violation we simply ignore.
        }
        Message::CreateProject(_)
        | Message::DeleteProject(_)
        | Message::OpenProject(_)
        | Message::RenameProject(_)
        | Message::CreateDoc(_)
        | Message::DeleteDoc(_)
        | Message::CreateFolder(_) => {
            // Project/document metadata management lives in the external
            // store; this core stubs every such request.
            let _ = conn
                .send(&Message::ErrorFulfillingProjectRequest(ErrorFulfillingServerRequest {
                    message: "project and document management are not implemented in this core".to_string(),
                }))
                .await;
        }
    }
    true
}
