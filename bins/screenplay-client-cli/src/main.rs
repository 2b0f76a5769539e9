// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A headless stand-in for the editor GUI: dial the hub, join one
//! document, append a line of text to it, and print the converged block
//! list once the upload is acknowledged. Exercises
//! `screenplay_client::ClientReplica` and `ClientIo` exactly the way a
//! real editor would, minus the UI.

mod config;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use screenplay_block::{Block, BlockType, ContentItem};
use screenplay_client::{connect, ClientIo, ClientReplica, FileCertPinStore, INBOX_DEPTH};
use screenplay_patch::Change;
use screenplay_wire::{FileId, IdOnly, LoginRequest, Message};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ClientPrefs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Screenplay sync headless client")]
struct Args {
    /// Hub hostname to dial. Overrides the saved config.
    #[arg(long)]
    host: Option<String>,
    /// Hub port to dial. Overrides the saved config.
    #[arg(long)]
    port: Option<u16>,
    /// Directory holding trust-on-first-use pinned certificates.
    #[arg(long)]
    crt_folder: Option<std::path::PathBuf>,
    /// Login username.
    #[arg(long, default_value = "guest")]
    username: String,
    /// 24-character hex id of the document to join.
    #[arg(long)]
    file_id: String,
    /// The line of text to append as a new block once joined.
    #[arg(long)]
    text: String,
}

impl Args {
    fn resolve(&self, saved: ClientPrefs) -> ClientPrefs {
        ClientPrefs {
            host: self.host.clone().unwrap_or(saved.host),
            port: self.port.unwrap_or(saved.port),
            crt_folder: self.crt_folder.clone().unwrap_or(saved.crt_folder),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let prefs = args.resolve(config::load_or_default());
    let file_id = FileId::from_hex(&args.file_id).context("parsing --file-id")?;

    let pin_store = Arc::new(FileCertPinStore::new(prefs.crt_folder.clone()).context("opening certificate pin store")?);
    let stream = connect(&prefs.host, prefs.port, pin_store)
        .await
        .with_context(|| format!("connecting to {}:{}", prefs.host, prefs.port))?;
    info!(host = %prefs.host, port = prefs.port, "connected");

    let (inbox_tx, mut inbox) = mpsc::channel::<Message>(INBOX_DEPTH);
    let io = ClientIo::spawn(stream, inbox_tx);

    io.send(Message::Login(LoginRequest {
        username: args.username.clone(),
        password: Vec::new(),
    }))
    .await
    .context("sending login request")?;
    match next_message(&mut inbox).await? {
        Message::LoginResult(screenplay_wire::LoginResult::Ok { user, .. }) => {
            info!(username = %user.username, "logged in");
        }
        Message::LoginResult(screenplay_wire::LoginResult::Err(code)) => {
            bail!("login rejected with code {code}");
        }
        other => bail!("unexpected reply to login: {other:?}"),
    }

    io.send(Message::JoinDoc(IdOnly { id: file_id }))
        .await
        .context("sending join request")?;
    let mut replica = match next_message(&mut inbox).await? {
        Message::SyncDoc(snapshot) => {
            info!(
                file_id = %snapshot.file_id,
                blocks = snapshot.blocks.len(),
                "joined document"
            );
            ClientReplica::new(snapshot.file_id, snapshot.blocks, snapshot.document_timestamp)
        }
        other => bail!("unexpected reply to join: {other:?}"),
    };

    let next_index = replica.blocks_advanced().len();
    let block = Block {
        block_type: BlockType::Action,
        contents: vec![ContentItem::Text(args.text.clone())],
        contents_modified: false,
    };
    let change = Change::AddBlock { index: next_index, block };
    let upload = replica.type_change(1, change);
    io.send(Message::ScriptPatch(upload)).await.context("uploading local edit")?;

    loop {
        match next_message(&mut inbox).await? {
            Message::ScriptPatchAck(ack) if ack.file_id == file_id => {
                replica.ack_change(&ack);
                break;
            }
            Message::ScriptPatched(update) if update.file_id == file_id => {
                let _ = replica.got_change(&update);
            }
            Message::JoinedDoc(_) | Message::LeftDoc(_) => {}
            other => warn!(?other, "ignoring unexpected message while awaiting ack"),
        }
    }

    println!("{}", render(replica.blocks_advanced()));
    io.send(Message::LeaveDoc(IdOnly { id: file_id })).await.ok();
    io.send(Message::Close).await.ok();
    io.close();
    Ok(())
}

/// Wait for the next decoded message, surfacing a closed inbox as an error.
async fn next_message(inbox: &mut mpsc::Receiver<Message>) -> Result<Message> {
    inbox.recv().await.context("connection closed before expected reply")
}

/// Render the converged block list as one line of plain text per block,
/// for a human (or a test harness) to eyeball.
fn render(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| {
            let text: String = block
                .contents
                .iter()
                .filter_map(|item| match item {
                    ContentItem::Text(t) => Some(t.as_str()),
                    ContentItem::Style(_) => None,
                })
                .collect();
            format!("[{:?}] {text}", block.block_type)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
