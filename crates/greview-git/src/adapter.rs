//! Hand-off of accepted pushes to git.
//!
//! The engine never looks inside pack data. It forwards the rewritten ref
//! updates and the raw pack to something that speaks receive-pack, and reads
//! back that side's status stream. The same repository later answers which
//! revisions a review has.

use crate::capabilities::{ATOMIC, REPORT_STATUS};
use crate::object::ObjectId;
use crate::pktline::{pkt_line, FLUSH};
use crate::request::UpdateRequest;
use crate::revision::{parse_revisions, review_refs_prefix, Revision};
use crate::{GitError, Result};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread;

/// Something that can store a pack and apply ref updates.
pub trait PackAdapter: Send + Sync {
    /// Applies `commands`, reading the pack from `pack`.
    ///
    /// Returns the raw pkt-line status stream, whose first line is
    /// `unpack ok` or `unpack <reason>`.
    fn accept(&self, commands: &[UpdateRequest], pack: &mut dyn Read) -> Result<Vec<u8>>;

    /// Lists the stored revisions of the review whose hidden refs live under
    /// `review_id`.
    fn revisions(&self, review_id: &str) -> Result<Vec<Revision>>;
}

impl<T: PackAdapter + ?Sized> PackAdapter for Arc<T> {
    fn accept(&self, commands: &[UpdateRequest], pack: &mut dyn Read) -> Result<Vec<u8>> {
        (**self).accept(commands, pack)
    }

    fn revisions(&self, review_id: &str) -> Result<Vec<Revision>> {
        (**self).revisions(review_id)
    }
}

/// Encodes `commands` as a receive-pack command list, flush included.
///
/// The first command asks for atomic application and a status report.
pub fn encode_commands(commands: &[UpdateRequest]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (i, command) in commands.iter().enumerate() {
        let line = if i == 0 {
            format!("{}\0{ATOMIC} {REPORT_STATUS}", command.to_command())
        } else {
            command.to_command()
        };
        out.extend(pkt_line(&line)?);
    }
    out.extend_from_slice(FLUSH);
    Ok(out)
}

/// Runs `git receive-pack --stateless-rpc` against a bare repository.
#[derive(Debug, Clone)]
pub struct GitReceivePack {
    git_path: PathBuf,
    repository_path: PathBuf,
}

impl GitReceivePack {
    /// Creates an adapter for the repository at `repository_path`.
    pub fn new(git_path: impl Into<PathBuf>, repository_path: impl Into<PathBuf>) -> Self {
        Self {
            git_path: git_path.into(),
            repository_path: repository_path.into(),
        }
    }

    /// Path of the git executable.
    pub fn git_path(&self) -> &Path {
        &self.git_path
    }

    /// Path of the bare repository.
    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    /// Creates the bare repository if it does not exist yet.
    ///
    /// Returns true if a repository was created.
    pub fn ensure_repository(&self) -> Result<bool> {
        if self.repository_path.exists() {
            return Ok(false);
        }

        let status = Command::new(&self.git_path)
            .args(["init", "--bare", "--quiet"])
            .arg(&self.repository_path)
            .stdin(Stdio::null())
            .status()?;

        if !status.success() {
            return Err(GitError::Process(format!(
                "git init --bare {} failed: {}",
                self.repository_path.display(),
                status
            )));
        }

        tracing::info!(path = %self.repository_path.display(), "Created review repository");
        Ok(true)
    }

    fn spawn(&self) -> Result<Child> {
        Command::new(&self.git_path)
            .args(["receive-pack", "--stateless-rpc", "."])
            .current_dir(&self.repository_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                GitError::Process(format!("failed to start {}: {e}", self.git_path.display()))
            })
    }
}

impl PackAdapter for GitReceivePack {
    fn accept(&self, commands: &[UpdateRequest], pack: &mut dyn Read) -> Result<Vec<u8>> {
        let preamble = encode_commands(commands)?;
        let mut child = self.spawn()?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(GitError::Process("git pipes unavailable".to_string()));
        };

        // Both output pipes are drained while input is still being written;
        // otherwise git blocks on a full pipe and we block on its stdin.
        let drained = thread::scope(|scope| -> Result<(Vec<u8>, Vec<u8>)> {
            let stdout_reader = scope.spawn(move || drain(stdout));
            let stderr_reader = scope.spawn(move || drain(stderr));

            let written = feed(stdin, &preamble, pack);

            let output = join(stdout_reader)?;
            let diagnostics = join(stderr_reader)?;

            match written {
                Ok(bytes) => tracing::debug!(bytes, "Pack forwarded to git"),
                // git stopped reading early; its status output says why.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    tracing::warn!(error = %e, "git closed its input early");
                }
                Err(e) => return Err(e.into()),
            }

            Ok((output, diagnostics))
        });

        let status = child.wait()?;
        let (output, diagnostics) = drained?;

        if !status.success() {
            tracing::warn!(
                %status,
                stderr = %String::from_utf8_lossy(&diagnostics).trim_end(),
                "git receive-pack exited unsuccessfully"
            );
        } else if !diagnostics.is_empty() {
            tracing::debug!(
                stderr = %String::from_utf8_lossy(&diagnostics).trim_end(),
                "git receive-pack diagnostics"
            );
        }

        Ok(output)
    }

    fn revisions(&self, review_id: &str) -> Result<Vec<Revision>> {
        let prefix = review_refs_prefix(review_id);
        let output = Command::new(&self.git_path)
            .args(["for-each-ref", "--format=%(objectname) %(refname)"])
            .arg(&prefix)
            .current_dir(&self.repository_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                GitError::Process(format!("failed to start {}: {e}", self.git_path.display()))
            })?;

        if !output.status.success() {
            return Err(GitError::Process(format!(
                "git for-each-ref {prefix} failed: {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim_end()
            )));
        }

        let refs = parse_ref_listing(&String::from_utf8_lossy(&output.stdout))?;
        Ok(parse_revisions(&prefix, refs))
    }
}

/// Parses `<object id> <ref name>` lines.
fn parse_ref_listing(listing: &str) -> Result<Vec<(ObjectId, String)>> {
    listing
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (id, name) = line.split_once(' ').ok_or_else(|| {
                GitError::Process(format!("unexpected for-each-ref line: {line:?}"))
            })?;
            Ok((ObjectId::from_hex(id)?, name.to_string()))
        })
        .collect()
}

/// Writes the command list and then the pack, closing stdin afterwards.
fn feed(mut stdin: ChildStdin, preamble: &[u8], pack: &mut dyn Read) -> io::Result<u64> {
    stdin.write_all(preamble)?;
    let copied = io::copy(pack, &mut stdin)?;
    stdin.flush()?;
    Ok(preamble.len() as u64 + copied)
}

fn drain(mut pipe: impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

fn join(handle: thread::ScopedJoinHandle<'_, io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| GitError::Process("pipe reader panicked".to_string()))?
        .map_err(GitError::from)
}
