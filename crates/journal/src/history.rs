//! History reconstruction and two-lane rendering
//!
//! With only HEAD known, history is HEAD's ancestor chain. Once a revert has
//! recorded the previous position in `LATEST`, the two lineages are split at
//! their lowest common ancestor: the shared part is drawn as one lane and the
//! commits unique to each side are interleaved on a left (LATEST) and a right
//! (HEAD) lane.

use crate::commit::{ancestor_chain, ancestors_between, find_lowest_common_ancestor, Commit, CommitSource};
use chrono::{DateTime, Local, TimeZone};
use keepsake_core::Result;
use std::cmp::Ordering;

/// Timestamp format used in history headers, e.g. `Fri, 1 Mar 2024 12:00:00 +0000`
pub const DATE_FORMAT: &str = "%a, %-d %b %Y %H:%M:%S %z";

/// Separator drawn where the lineages fork
pub const FORK_MARK: &str = "|/";

/// Which lineage a diverged commit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Only reachable from the LATEST marker (left lane)
    Marker,
    /// Only reachable from HEAD (right lane)
    Head,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum History {
    /// A single lineage, HEAD first
    Linear(Vec<Commit>),
    /// Two lineages split at their common ancestor
    Diverged {
        /// The common ancestor and everything before it, newest first
        shared: Vec<Commit>,
        /// Commits unique to either side, newest first
        branches: Vec<(Commit, Lane)>,
    },
}

/// Newest first; equal timestamps fall back to hash order
fn newest_first(a: &Commit, b: &Commit) -> Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| a.hash.cmp(&b.hash))
}

impl History {
    /// Rebuild history for `head`, comparing against `marker` when given
    pub fn reconstruct<S: CommitSource + ?Sized>(
        source: &S,
        head: &Commit,
        marker: Option<&Commit>,
    ) -> Result<Self> {
        let marker = match marker {
            Some(marker) if marker.hash != head.hash => marker,
            _ => return Ok(History::Linear(ancestor_chain(source, head)?)),
        };

        let (mut shared, marker_only, head_only) =
            match find_lowest_common_ancestor(source, head, marker)? {
                Some(lca) => (
                    ancestor_chain(source, &lca)?,
                    ancestors_between(source, marker, &lca)?,
                    ancestors_between(source, head, &lca)?,
                ),
                None => (
                    Vec::new(),
                    ancestor_chain(source, marker)?,
                    ancestor_chain(source, head)?,
                ),
            };

        shared.sort_by(newest_first);

        let mut branches: Vec<(Commit, Lane)> = marker_only
            .into_iter()
            .map(|c| (c, Lane::Marker))
            .chain(head_only.into_iter().map(|c| (c, Lane::Head)))
            .collect();
        branches.sort_by(|(a, _), (b, _)| newest_first(a, b));

        Ok(History::Diverged { shared, branches })
    }

    /// Display lines, two per commit plus lane connectors
    pub fn render(&self) -> Vec<String> {
        match self {
            History::Linear(commits) => commits
                .iter()
                .flat_map(|c| [header_line(c), message_line(c)])
                .collect(),
            History::Diverged { shared, branches } => {
                let mut lines = Vec::with_capacity((shared.len() + branches.len()) * 2 + 1);
                for commit in shared {
                    lines.push(format!("| {}", message_line(commit)));
                    lines.push(format!("* {}", header_line(commit)));
                }

                lines.push(FORK_MARK.to_string());

                for (commit, lane) in branches {
                    lines.push(format!("| | {}", message_line(commit)));
                    match lane {
                        Lane::Marker => lines.push(format!("* | {}", header_line(commit))),
                        Lane::Head => lines.push(format!("| * {}", header_line(commit))),
                    }
                }
                lines
            }
        }
    }
}

/// `<short hash> - <local date>`
pub fn header_line(commit: &Commit) -> String {
    format!(
        "{} - {}",
        commit.short_hash(),
        format_timestamp(&commit.timestamp.with_timezone(&Local))
    )
}

/// Render `ts` in its own offset with [`DATE_FORMAT`]
pub fn format_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.format(DATE_FORMAT).to_string()
}

pub fn message_line(commit: &Commit) -> String {
    format!("\t\t{}", commit.message)
}
