//! Append-only JSON-lines journal.
//!
//! Every notification is one line; loading replays the file in order.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use super::{IdOrigin, Persistence};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Entry {
    AddPeer { address: String },
    RemovePeer { address: String },
    Id { id: u64, merged: bool },
    ClearIds,
}

enum Command {
    Append(String),
    Flush(oneshot::Sender<()>),
}

/// File-backed persistence.
///
/// Notifications are queued to a single writer task and never touch the
/// disk on the caller's thread. Loads return the journal as it was when the
/// store was opened.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    tx: mpsc::UnboundedSender<Command>,
    peers: Vec<String>,
    ids: Vec<u64>,
}

impl JsonLinesStore {
    /// Open (creating if needed) the journal at `path`, replay it, and spawn
    /// the writer task. Must be called inside a tokio runtime.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::OpenOptions::new().create(true).append(true).open(&path)?;

        let entries = replay(&path)?;
        let peers = fold_peers(&entries);
        let ids = fold_ids(&entries);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(path.clone(), rx));

        tracing::info!(
            path = %path.display(),
            peers = peers.len(),
            ids = ids.len(),
            "Persistence journal opened"
        );
        Ok(Self { path, tx, peers, ids })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &Entry) {
        let mut line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode journal entry");
                return;
            }
        };
        line.push('\n');
        if self.tx.send(Command::Append(line)).is_err() {
            tracing::error!(path = %self.path.display(), "Journal writer has stopped; entry dropped");
        }
    }
}

/// Drain queued lines in batches, one write call per batch.
async fn write_loop(path: PathBuf, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to open journal for writing");
            while let Some(command) = rx.recv().await {
                if let Command::Flush(ack) = command {
                    let _ = ack.send(());
                }
            }
            return;
        }
    };

    let mut pending = String::new();
    let mut acks = Vec::new();
    while let Some(command) = rx.recv().await {
        let mut next = Some(command);
        while let Some(command) = next {
            match command {
                Command::Append(line) => pending.push_str(&line),
                Command::Flush(ack) => acks.push(ack),
            }
            next = rx.try_recv().ok();
        }

        if !pending.is_empty() {
            if let Err(e) = file.write_all(pending.as_bytes()).await {
                tracing::error!(path = %path.display(), error = %e, "Failed to append journal entries");
            }
            pending.clear();
        }
        if !acks.is_empty() {
            if let Err(e) = file.flush().await {
                tracing::error!(path = %path.display(), error = %e, "Failed to flush journal");
            }
            for ack in acks.drain(..) {
                let _ = ack.send(());
            }
        }
    }

    if let Err(e) = file.flush().await {
        tracing::error!(path = %path.display(), error = %e, "Failed to flush journal on close");
    }
}

fn replay(path: &Path) -> std::io::Result<Vec<Entry>> {
    let file = File::open(path)?;
    let mut entries = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read journal");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Entry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(line = lineno + 1, error = %e, "Skipping corrupt journal line"),
        }
    }
    Ok(entries)
}

fn fold_peers(entries: &[Entry]) -> Vec<String> {
    let mut peers: Vec<String> = Vec::new();
    for entry in entries {
        match entry {
            Entry::AddPeer { address } => {
                if !peers.contains(address) {
                    peers.push(address.clone());
                }
            }
            Entry::RemovePeer { address } => peers.retain(|p| p != address),
            _ => {}
        }
    }
    peers
}

fn fold_ids(entries: &[Entry]) -> Vec<u64> {
    let mut ids = BTreeSet::new();
    for entry in entries {
        match entry {
            Entry::Id { id, .. } => {
                ids.insert(*id);
            }
            Entry::ClearIds => ids.clear(),
            _ => {}
        }
    }
    ids.into_iter().collect()
}

impl Persistence for JsonLinesStore {
    fn save_peer(&self, address: &str) {
        self.append(&Entry::AddPeer {
            address: address.to_string(),
        });
    }

    fn delete_peer(&self, address: &str) {
        self.append(&Entry::RemovePeer {
            address: address.to_string(),
        });
    }

    fn load_peers(&self) -> Vec<String> {
        self.peers.clone()
    }

    fn save_id(&self, id: u64, origin: IdOrigin) {
        self.append(&Entry::Id {
            id,
            merged: origin == IdOrigin::Merged,
        });
    }

    fn load_ids(&self) -> Vec<u64> {
        self.ids.clone()
    }

    fn clear_ids(&self) {
        self.append(&Entry::ClearIds);
    }

    fn flush(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let (ack, done) = oneshot::channel();
            if self.tx.send(Command::Flush(ack)).is_ok() {
                let _ = done.await;
            }
        })
    }
}
