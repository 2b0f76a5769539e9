// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A small file-backed configuration layer, mirroring
//! `screenplay-serverd`'s `config` module: the daemon persists the
//! address it listens on, this binary persists the address it dials and
//! where it keeps its pinned certificates.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Persisted client settings. Any field the CLI doesn't override is read
/// from (and, the first time, written to) this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPrefs {
    /// The hub host to dial.
    pub host: String,
    /// The hub port to dial.
    pub port: u16,
    /// Directory holding trust-on-first-use pinned certificates.
    pub crt_folder: PathBuf,
}

impl Default for ClientPrefs {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: screenplay_wire::DEFAULT_PORT,
            crt_folder: PathBuf::from("pinned-certs"),
        }
    }
}

/// Loads `ClientPrefs` from `<platform config dir>/screenplay-client-cli/client.json`,
/// writing the defaults back out the first time nothing is present.
///
/// Best-effort: any I/O or parse failure is logged and falls back to
/// [`ClientPrefs::default`] rather than failing startup.
pub fn load_or_default() -> ClientPrefs {
    match config_path() {
        Some(path) => load_from(&path).unwrap_or_else(|| {
            let prefs = ClientPrefs::default();
            save_to(&path, &prefs);
            prefs
        }),
        None => ClientPrefs::default(),
    }
}

fn config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("dev", "flyingrobots", "screenplay-client-cli")?;
    Some(proj.config_dir().join("client.json"))
}

fn load_from(path: &Path) -> Option<ClientPrefs> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes)
        .map_err(|err| tracing::warn!(?err, path = %path.display(), "failed to parse client config"))
        .ok()
}

fn save_to(path: &Path, prefs: &ClientPrefs) {
    let Some(parent) = path.parent() else { return };
    if let Err(err) = fs::create_dir_all(parent) {
        tracing::warn!(?err, path = %parent.display(), "failed to create config directory");
        return;
    }
    match serde_json::to_vec_pretty(prefs) {
        Ok(bytes) => {
            if let Err(err) = fs::write(path, bytes) {
                tracing::warn!(?err, path = %path.display(), "failed to write default client config");
            }
        }
        Err(err) => tracing::warn!(?err, "failed to serialize default client config"),
    }
}
