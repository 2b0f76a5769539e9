// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The session hub daemon: a TLS accept loop over
//! `screenplay_server::session::serve_connection`, plus a console task
//! that reads `quit` off stdin to shut the process down cleanly.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use screenplay_net::{load_certs, load_key, server_acceptor};
use screenplay_server::{AllowAllAuthProvider, Hub, NullDocumentStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerPrefs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Screenplay sync session hub")]
struct Args {
    /// Address to accept TLS connections on. Overrides the saved config.
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,
    /// TLS certificate chain (PEM). Overrides the saved config.
    #[arg(long)]
    tls_cert: Option<PathBuf>,
    /// TLS private key (PEM). Overrides the saved config.
    #[arg(long)]
    tls_key: Option<PathBuf>,
}

impl Args {
    fn resolve(self, saved: ServerPrefs) -> ServerPrefs {
        ServerPrefs {
            listen: self.listen.unwrap_or(saved.listen),
            tls_cert: self.tls_cert.unwrap_or(saved.tls_cert),
            tls_key: self.tls_key.unwrap_or(saved.tls_key),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let prefs = args.resolve(config::load_or_default());

    let certs = load_certs(&prefs.tls_cert).context("loading TLS certificate chain")?;
    let key = load_key(&prefs.tls_key).context("loading TLS private key")?;
    let acceptor = server_acceptor(certs, key).context("building TLS acceptor")?;

    let hub = Arc::new(Hub::new(Arc::new(NullDocumentStore), Arc::new(AllowAllAuthProvider)));

    let listener = TcpListener::bind(prefs.listen)
        .await
        .with_context(|| format!("binding {}", prefs.listen))?;
    info!(addr = %prefs.listen, "screenplay-serverd listening");

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(?err, "accept failed");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let hub = hub.clone();
                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(err) => {
                            warn!(?err, ?peer, "TLS handshake failed");
                            return;
                        }
                    };
                    screenplay_server::serve_connection(tls_stream, hub).await;
                });
            }
            line = stdin_lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(cmd)) if cmd.trim() == "quit" => {
                        info!("quit received, shutting down");
                        break;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => {
                        // stdin closed (e.g. running under a supervisor
                        // with no attached terminal) — stop polling it
                        // and keep serving connections.
                        stdin_open = false;
                    }
                }
            }
        }
    }

    Ok(())
}
