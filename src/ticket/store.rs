//! Ticket Store (component 2): the on-disk `todo/doing/done` representation.
//!
//! Directory scans above a small threshold are parallelized across a bounded
//! worker pool (`rayon`, grounded on the teacher's use of `rayon` for
//! directory-wide work — see `Cargo.toml`'s `rayon` dependency, exercised by
//! `wt list`). Chunked, cancellation-aware file I/O is new relative to the
//! teacher (which has no equivalent file-size ceiling) and is grounded on
//! the same deadline/cancellation discipline used by the Git Adapter
//! (`git::process`).

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::{frontmatter, Status, Ticket};
use crate::cancel::CancellationToken;
use crate::error::TicketFlowError;

/// Reads/writes above this size proceed in chunks with a cancellation check
/// between chunks (§4.2).
const CHUNK_THRESHOLD: u64 = 1024 * 1024;
const CHUNK_SIZE: usize = 64 * 1024;
/// Hard per-file ceiling rejecting pathological inputs (§4.2).
const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
/// Directory scans above this many entries are parallelized (§4.2).
const PARALLEL_THRESHOLD: usize = 10;

/// Owns the on-disk representation rooted at `tickets.dir` inside the
/// repository.
#[derive(Debug, Clone)]
pub struct TicketStore {
    root: PathBuf,
}

impl TicketStore {
    /// `root` is the tickets directory (e.g. `<repo>/tickets`), containing
    /// `todo/`, `doing/`, `done/`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, status: Status) -> PathBuf {
        self.root.join(status.dir_name())
    }

    fn path_for(&self, status: Status, id: &str) -> PathBuf {
        self.dir(status).join(format!("{id}.md"))
    }

    /// Public accessor for callers outside the store that need a ticket's
    /// on-disk path, e.g. to stage it with the Git Adapter (`git add`).
    pub fn ticket_path(&self, status: Status, id: &str) -> PathBuf {
        self.path_for(status, id)
    }

    fn locate(&self, id: &str) -> Option<(Status, PathBuf)> {
        for status in [Status::Todo, Status::Doing, Status::Done] {
            let path = self.path_for(status, id);
            if path.is_file() {
                return Some((status, path));
            }
        }
        None
    }

    /// Locates the file across `todo/doing/done`, parses front-matter and
    /// body, infers status from the directory (§4.2).
    pub fn load(&self, id: &str, token: &CancellationToken) -> Result<Ticket, TicketFlowError> {
        let (status, path) = self.locate(id).ok_or_else(|| TicketFlowError::TicketNotFound { id: id.to_string() })?;
        let raw = read_chunked(&path, token)?;
        let ticket = frontmatter::parse(&raw, status)?;
        self.warn_on_dangling_related(&ticket);
        Ok(ticket)
    }

    /// §9: a `related:` entry naming a ticket id that no longer exists is a
    /// warning, not an error — the referenced ticket may simply have been
    /// deleted out of band.
    fn warn_on_dangling_related(&self, ticket: &Ticket) {
        if let Some(parent_id) = ticket.related_parent() {
            if self.locate(parent_id).is_none() {
                log::warn!("ticket {} has a dangling related parent reference: {parent_id}", ticket.id);
            }
        }
    }

    /// Enumerates the relevant directories; deterministic ordering
    /// (lexicographic by id). Parallelizes the per-file parse across a
    /// bounded worker pool for large directories (§4.2).
    pub fn list(
        &self,
        status_filter: Option<Status>,
        token: &CancellationToken,
    ) -> Result<Vec<Ticket>, TicketFlowError> {
        let statuses: Vec<Status> = match status_filter {
            Some(s) => vec![s],
            None => vec![Status::Todo, Status::Doing, Status::Done],
        };

        let mut paths = Vec::new();
        for status in statuses {
            let dir = self.dir(status);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.path().extension().and_then(|e| e.to_str()) == Some("md") {
                    paths.push((status, entry.path()));
                }
            }
        }

        let parse_one = |(status, path): &(Status, PathBuf)| -> Result<Ticket, TicketFlowError> {
            let raw = read_chunked(path, token)?;
            let ticket = frontmatter::parse(&raw, *status)?;
            self.warn_on_dangling_related(&ticket);
            Ok(ticket)
        };

        let mut tickets: Vec<Ticket> = if paths.len() >= PARALLEL_THRESHOLD {
            paths
                .par_iter()
                .map(parse_one)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            paths.iter().map(parse_one).collect::<Result<Vec<_>, _>>()?
        };

        tickets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tickets)
    }

    /// Writes the file into `todo/`, failing if the id already exists (§4.2).
    pub fn create(&self, ticket: &Ticket, token: &CancellationToken) -> Result<(), TicketFlowError> {
        if self.locate(&ticket.id).is_some() {
            return Err(TicketFlowError::InvalidFormat {
                detail: format!("ticket {} already exists", ticket.id),
            });
        }
        let dir = self.dir(Status::Todo);
        fs::create_dir_all(&dir)?;
        let path = self.path_for(Status::Todo, &ticket.id);
        write_chunked(&path, frontmatter::render(ticket).as_bytes(), token)
    }

    /// Writes the file into its current status directory, replacing any
    /// existing file — used to seed a freshly created worktree with the
    /// in-progress ticket (§4.3.2 step 5), where `create`'s existence check
    /// would otherwise reject it.
    pub fn create_overwrite(&self, ticket: &Ticket, token: &CancellationToken) -> Result<(), TicketFlowError> {
        let dir = self.dir(ticket.status);
        fs::create_dir_all(&dir)?;
        let path = self.path_for(ticket.status, &ticket.id);
        write_chunked(&path, frontmatter::render(ticket).as_bytes(), token)
    }

    /// Rewrites the file in place at its current status directory (§4.2).
    pub fn update(&self, ticket: &Ticket, token: &CancellationToken) -> Result<(), TicketFlowError> {
        let path = self.path_for(ticket.status, &ticket.id);
        if !path.is_file() {
            return Err(TicketFlowError::TicketNotFound { id: ticket.id.clone() });
        }
        write_chunked(&path, frontmatter::render(ticket).as_bytes(), token)
    }

    /// Renames across status directories; atomic on POSIX renames. Rolls
    /// back `ticket.status` on failure (§4.2).
    pub fn move_status(
        &self,
        ticket: &mut Ticket,
        new_status: Status,
        token: &CancellationToken,
    ) -> Result<(), TicketFlowError> {
        let old_status = ticket.status;
        if old_status == new_status {
            return Ok(());
        }
        let old_path = self.path_for(old_status, &ticket.id);
        let new_dir = self.dir(new_status);
        fs::create_dir_all(&new_dir)?;
        let new_path = self.path_for(new_status, &ticket.id);

        ticket.status = new_status;
        // Persist the status-derived content (e.g. updated timestamps) before
        // the move so the destination file already reflects the new status.
        if let Err(e) = write_chunked(&old_path, frontmatter::render(ticket).as_bytes(), token) {
            ticket.status = old_status;
            return Err(e);
        }
        if let Err(e) = fs::rename(&old_path, &new_path) {
            ticket.status = old_status;
            return Err(TicketFlowError::Io(e));
        }
        Ok(())
    }

    fn current_symlink_path(&self, worktree_root: &Path) -> PathBuf {
        worktree_root.join("current-ticket.md")
    }

    /// Creates/replaces/removes the `current-ticket.md` symlink (§4.2).
    pub fn set_current(&self, worktree_root: &Path, ticket: Option<&Ticket>) -> Result<(), TicketFlowError> {
        let link = self.current_symlink_path(worktree_root);
        if link.is_symlink() || link.exists() {
            fs::remove_file(&link)?;
        }
        if let Some(ticket) = ticket {
            let target = self.path_for(Status::Doing, &ticket.id);
            let base = link.parent().unwrap_or(worktree_root);
            symlink(&relative_to(&target, base), &link)?;
        }
        Ok(())
    }

    /// Resolves the symlink; `Ok(None)` if missing; a typed error if it
    /// exists but the target is absent (§4.2).
    pub fn current(&self, worktree_root: &Path) -> Result<Option<PathBuf>, TicketFlowError> {
        let link = self.current_symlink_path(worktree_root);
        if !link.is_symlink() {
            return Ok(None);
        }
        let target = fs::read_link(&link)?;
        let resolved = if target.is_absolute() { target.clone() } else { link.parent().unwrap_or(worktree_root).join(&target) };
        if !resolved.is_file() {
            return Err(TicketFlowError::BrokenSymlink { path: link });
        }
        Ok(Some(resolved))
    }
}

/// Rewrites `target` as a relative path from `base` by dropping the common
/// prefix and walking `..` up to it — the symlink written by `set_current`
/// must stay relative (§4.2), since `base` and `target` may sit under
/// different worktrees sharing no containment relationship.
fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base.components().collect();
    let common = target_components.iter().zip(base_components.iter()).take_while(|(a, b)| a == b).count();
    let mut result = PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component.as_os_str());
    }
    result
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

fn read_chunked(path: &Path, token: &CancellationToken) -> Result<String, TicketFlowError> {
    let metadata = fs::metadata(path)?;
    let size = metadata.len();
    if size > MAX_FILE_SIZE {
        return Err(TicketFlowError::FileTooLarge { path: path.to_path_buf(), size, limit: MAX_FILE_SIZE });
    }
    let mut file = fs::File::open(path)?;
    if size < CHUNK_THRESHOLD {
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        return Ok(buf);
    }

    let mut buf = Vec::with_capacity(size as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        token.check()?;
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf).map_err(|e| TicketFlowError::InvalidFormat { detail: e.to_string() })
}

fn write_chunked(path: &Path, data: &[u8], token: &CancellationToken) -> Result<(), TicketFlowError> {
    if data.len() as u64 > MAX_FILE_SIZE {
        return Err(TicketFlowError::FileTooLarge {
            path: path.to_path_buf(),
            size: data.len() as u64,
            limit: MAX_FILE_SIZE,
        });
    }
    let mut file = fs::File::create(path)?;
    if (data.len() as u64) < CHUNK_THRESHOLD {
        file.write_all(data)?;
    } else {
        for chunk in data.chunks(CHUNK_SIZE) {
            token.check()?;
            file.write_all(chunk)?;
        }
    }
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn make_ticket(slug: &str) -> Ticket {
        Ticket::new(Utc::now(), slug.into(), 1, "body".into()).unwrap()
    }

    #[test]
    fn create_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        let ticket = make_ticket("fix-login");
        store.create(&ticket, &token).unwrap();
        let loaded = store.load(&ticket.id, &token).unwrap();
        assert_eq!(loaded.id, ticket.id);
        assert_eq!(loaded.status, Status::Todo);
    }

    #[test]
    fn dangling_related_parent_warns_but_does_not_error() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        let mut ticket = make_ticket("orphan-child");
        ticket.related.push("parent:nonexistent-ticket-id".to_string());
        store.create(&ticket, &token).unwrap();

        let loaded = store.load(&ticket.id, &token).unwrap();
        assert_eq!(loaded.related_parent(), Some("nonexistent-ticket-id"));
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        let ticket = make_ticket("dup");
        store.create(&ticket, &token).unwrap();
        assert!(store.create(&ticket, &token).is_err());
    }

    #[test]
    fn move_status_relocates_file_and_updates_in_memory_status() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        let mut ticket = make_ticket("move-me");
        store.create(&ticket, &token).unwrap();
        ticket.started_at = Some(Utc::now());
        store.move_status(&mut ticket, Status::Doing, &token).unwrap();
        assert_eq!(ticket.status, Status::Doing);
        assert!(!store.path_for(Status::Todo, &ticket.id).exists());
        assert!(store.path_for(Status::Doing, &ticket.id).exists());
    }

    #[test]
    fn list_is_sorted_and_covers_all_statuses() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        for slug in ["zeta", "alpha", "mid"] {
            store.create(&make_ticket(slug), &token).unwrap();
        }
        let tickets = store.list(None, &token).unwrap();
        assert_eq!(tickets.len(), 3);
        assert!(tickets.windows(2).all(|w| w[0].id <= w[1].id));
    }

    #[test]
    fn current_symlink_round_trips() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        let mut ticket = make_ticket("current-me");
        store.create(&ticket, &token).unwrap();
        store.move_status(&mut ticket, Status::Doing, &token).unwrap();
        store.set_current(dir.path(), Some(&ticket)).unwrap();
        let resolved = store.current(dir.path()).unwrap().unwrap();
        assert_eq!(resolved, store.path_for(Status::Doing, &ticket.id));
        store.set_current(dir.path(), None).unwrap();
        assert!(store.current(dir.path()).unwrap().is_none());
    }

    #[test]
    fn current_symlink_target_is_relative() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        let mut ticket = make_ticket("relative-target");
        store.create(&ticket, &token).unwrap();
        store.move_status(&mut ticket, Status::Doing, &token).unwrap();
        store.set_current(dir.path(), Some(&ticket)).unwrap();
        let link = store.current_symlink_path(dir.path());
        let target = fs::read_link(&link).unwrap();
        assert!(target.is_relative(), "symlink target {target:?} must be relative per spec");
    }

    #[test]
    fn broken_symlink_is_reported() {
        let dir = tempdir().unwrap();
        let store = TicketStore::new(dir.path().join("tickets"));
        let token = CancellationToken::new();
        let mut ticket = make_ticket("gone");
        store.create(&ticket, &token).unwrap();
        store.move_status(&mut ticket, Status::Doing, &token).unwrap();
        store.set_current(dir.path(), Some(&ticket)).unwrap();
        fs::remove_file(store.path_for(Status::Doing, &ticket.id)).unwrap();
        assert!(matches!(store.current(dir.path()), Err(TicketFlowError::BrokenSymlink { .. })));
    }
}
