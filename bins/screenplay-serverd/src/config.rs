// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A small file-backed configuration layer storing this daemon's own
//! settings (listen address, TLS cert/key paths) in the platform config
//! directory. Scoped to this binary rather than pulled in as a shared
//! dependency, since these settings have nothing in common with
//! project/document preference data.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Persisted daemon settings. Any field the CLI doesn't override is read
/// from (and, the first time, written to) this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPrefs {
    /// The address to accept TLS connections on.
    pub listen: SocketAddr,
    /// PEM certificate chain path.
    pub tls_cert: PathBuf,
    /// PEM private key path.
    pub tls_key: PathBuf,
}

impl Default for ServerPrefs {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], screenplay_wire::DEFAULT_PORT)),
            tls_cert: PathBuf::from("server.crt"),
            tls_key: PathBuf::from("server.key"),
        }
    }
}

/// Loads `ServerPrefs` from `<platform config dir>/screenplay-serverd/server.json`,
/// writing the defaults back out the first time nothing is present.
///
/// Best-effort: any I/O or parse failure is logged and falls back to
/// [`ServerPrefs::default`] rather than failing startup.
pub fn load_or_default() -> ServerPrefs {
    match config_path() {
        Some(path) => load_from(&path).unwrap_or_else(|| {
            let prefs = ServerPrefs::default();
            save_to(&path, &prefs);
            prefs
        }),
        None => ServerPrefs::default(),
    }
}

fn config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("dev", "flyingrobots", "screenplay-serverd")?;
    Some(proj.config_dir().join("server.json"))
}

fn load_from(path: &Path) -> Option<ServerPrefs> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes)
        .map_err(|err| tracing::warn!(?err, path = %path.display(), "failed to parse server config"))
        .ok()
}

fn save_to(path: &Path, prefs: &ServerPrefs) {
    let Some(parent) = path.parent() else { return };
    if let Err(err) = fs::create_dir_all(parent) {
        tracing::warn!(?err, path = %parent.display(), "failed to create config directory");
        return;
    }
    match serde_json::to_vec_pretty(prefs) {
        Ok(bytes) => {
            if let Err(err) = fs::write(path, bytes) {
                tracing::warn!(?err, path = %path.display(), "failed to write default server config");
            }
        }
        Err(err) => tracing::warn!(?err, "failed to serialize default server config"),
    }
}
