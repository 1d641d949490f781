//! Commit objects and ancestry walks

use ahash::AHashSet;
use chrono::{DateTime, SecondsFormat, Utc};
use keepsake_core::hash::{ContentHash, HEX_LEN};
use keepsake_core::{ObjectStore, Result, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Shortest prefix accepted by [`CommitLog::fetch_by_hash`]
pub const MIN_PREFIX_LEN: usize = 4;

/// An immutable history node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Hash of the encoded commit, also its store key
    pub hash: ContentHash,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Root tree of the snapshot
    pub tree: ContentHash,
    /// `None` for a root commit
    pub parent: Option<ContentHash>,
}

/// Hashed and stored fields of a commit
#[derive(Serialize, Deserialize)]
struct CommitRecord {
    message: String,
    author: String,
    timestamp: String,
    tree: ContentHash,
    parent: Option<ContentHash>,
}

impl Commit {
    pub const MAGIC: &'static [u8; 4] = b"KSC1";

    /// Encoded form: magic followed by the bincode record
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Self::encode(&self.message, &self.author, &self.timestamp, &self.tree, self.parent.as_ref())
    }

    fn encode(
        message: &str,
        author: &str,
        timestamp: &DateTime<Utc>,
        tree: &ContentHash,
        parent: Option<&ContentHash>,
    ) -> Result<Vec<u8>> {
        let record = CommitRecord {
            message: message.to_string(),
            author: author.to_string(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            tree: *tree,
            parent: parent.copied(),
        };
        let mut bytes = Self::MAGIC.to_vec();
        bincode::serialize_into(&mut bytes, &record).map_err(|e| StoreError::Encode {
            kind: "commit",
            reason: e.to_string(),
        })?;
        Ok(bytes)
    }

    /// Decode stored bytes; `hash` is the key they were stored under
    pub fn deserialize(hash: ContentHash, bytes: &[u8]) -> std::result::Result<Self, String> {
        let payload = bytes
            .strip_prefix(Self::MAGIC.as_slice())
            .ok_or_else(|| "not a commit object".to_string())?;
        let record: CommitRecord = bincode::deserialize(payload).map_err(|e| e.to_string())?;
        let timestamp = DateTime::parse_from_rfc3339(&record.timestamp)
            .map_err(|e| format!("bad timestamp {:?}: {}", record.timestamp, e))?
            .with_timezone(&Utc);

        Ok(Self {
            hash,
            author: record.author,
            timestamp,
            message: record.message,
            tree: record.tree,
            parent: record.parent,
        })
    }

    pub fn short_hash(&self) -> String {
        self.hash.short()
    }
}

/// Anything commits can be loaded from by hash
///
/// The ancestry algorithms below only need this, which keeps them usable
/// over in-memory graphs as well as the on-disk store.
pub trait CommitSource {
    /// Load a commit that is expected to exist
    fn load_commit(&self, hash: &ContentHash) -> Result<Commit>;
}

/// Walk parent links from `start` to the root, `start` included
///
/// Fails with [`StoreError::CycleDetected`] if a commit is reached twice.
pub fn ancestor_chain<S: CommitSource + ?Sized>(source: &S, start: &Commit) -> Result<Vec<Commit>> {
    walk_until(source, start, None)
}

/// Commits from `from` up to but excluding `until`
///
/// If `until` is not an ancestor of `from`, this is the whole chain.
pub fn ancestors_between<S: CommitSource + ?Sized>(
    source: &S,
    from: &Commit,
    until: &Commit,
) -> Result<Vec<Commit>> {
    walk_until(source, from, Some(&until.hash))
}

fn walk_until<S: CommitSource + ?Sized>(
    source: &S,
    start: &Commit,
    stop: Option<&ContentHash>,
) -> Result<Vec<Commit>> {
    let mut chain = Vec::new();
    let mut seen = AHashSet::new();
    let mut current = start.clone();

    loop {
        if Some(&current.hash) == stop {
            break;
        }
        if !seen.insert(current.hash) {
            return Err(StoreError::CycleDetected(current.hash.to_hex()));
        }
        let parent = current.parent;
        chain.push(current);

        match parent {
            Some(parent) => current = source.load_commit(&parent)?,
            None => break,
        }
    }

    Ok(chain)
}

/// Lowest common ancestor of `a` and `b`
///
/// The first commit on `a`'s chain that is also on `b`'s. `lca(c, c)` is `c`;
/// unrelated commits give `None`.
pub fn find_lowest_common_ancestor<S: CommitSource + ?Sized>(
    source: &S,
    a: &Commit,
    b: &Commit,
) -> Result<Option<Commit>> {
    let b_ancestors: AHashSet<ContentHash> = ancestor_chain(source, b)?
        .into_iter()
        .map(|c| c.hash)
        .collect();

    Ok(ancestor_chain(source, a)?
        .into_iter()
        .find(|c| b_ancestors.contains(&c.hash)))
}

/// Commit layer over an [`ObjectStore`]
pub struct CommitLog<'s> {
    store: &'s ObjectStore,
}

impl<'s> CommitLog<'s> {
    pub fn new(store: &'s ObjectStore) -> Self {
        Self { store }
    }

    /// Build a commit stamped with the store's author and the current time
    pub fn create_commit(&self, message: &str, tree: ContentHash, parent: Option<&Commit>) -> Result<Commit> {
        self.create_commit_at(message, tree, parent, Utc::now())
    }

    /// Build a commit with an explicit timestamp; nothing is written
    pub fn create_commit_at(
        &self,
        message: &str,
        tree: ContentHash,
        parent: Option<&Commit>,
        timestamp: DateTime<Utc>,
    ) -> Result<Commit> {
        let author = self.store.config().author();
        let parent = parent.map(|p| p.hash);
        let encoded = Commit::encode(message, &author, &timestamp, &tree, parent.as_ref())?;

        Ok(Commit {
            hash: self.store.hash(&encoded),
            author,
            timestamp,
            message: message.to_string(),
            tree,
            parent,
        })
    }

    /// Persist a commit; returns `false` if it was already stored
    pub fn write(&self, commit: &Commit) -> Result<bool> {
        self.store.write_object(&commit.hash, &commit.serialize()?)
    }

    /// Load the commit stored under `hash`, failing if absent or corrupt
    pub fn load(&self, hash: &ContentHash) -> Result<Commit> {
        let bytes = self.store.read_verified(hash)?;
        Commit::deserialize(*hash, &bytes).map_err(|reason| StoreError::corrupt(hash.to_hex(), reason))
    }

    /// Look a commit up by full hash or unique prefix
    ///
    /// Unknown, ambiguous, malformed and corrupt all give `None`.
    pub fn fetch_by_hash(&self, hash_or_prefix: &str) -> Option<Commit> {
        let prefix = hash_or_prefix.trim().to_ascii_lowercase();
        if prefix.len() < MIN_PREFIX_LEN
            || prefix.len() > HEX_LEN
            || !prefix.bytes().all(|b| b.is_ascii_hexdigit())
        {
            debug!(reference = hash_or_prefix, "not a commit hash or prefix");
            return None;
        }

        if prefix.len() == HEX_LEN {
            let hash = ContentHash::from_hex(&prefix).ok()?;
            return self.load_quiet(&hash);
        }

        let keys = match self.store.keys_with_prefix(&prefix) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to scan object store");
                return None;
            }
        };

        let mut matches = keys.iter().filter_map(|key| self.load_quiet(key));
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(prefix = %prefix, "ambiguous commit prefix");
            return None;
        }
        Some(first)
    }

    fn load_quiet(&self, hash: &ContentHash) -> Option<Commit> {
        match self.load(hash) {
            Ok(commit) => Some(commit),
            Err(StoreError::MissingObject(_)) => None,
            Err(e) => {
                debug!(object = %hash, error = %e, "skipping object that is not a readable commit");
                None
            }
        }
    }

    pub fn ancestor_chain(&self, start: &Commit) -> Result<Vec<Commit>> {
        ancestor_chain(self, start)
    }

    pub fn ancestors_between(&self, from: &Commit, until: &Commit) -> Result<Vec<Commit>> {
        ancestors_between(self, from, until)
    }

    pub fn find_lowest_common_ancestor(&self, a: &Commit, b: &Commit) -> Result<Option<Commit>> {
        find_lowest_common_ancestor(self, a, b)
    }
}

impl CommitSource for CommitLog<'_> {
    fn load_commit(&self, hash: &ContentHash) -> Result<Commit> {
        self.load(hash)
    }
}
