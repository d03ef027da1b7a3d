use std::ffi::OsStr;
use std::path::Path;

use tracing::debug;

use super::{Filter, IgnoreRequests};

const VCS_METADATA_DIR: &str = ".git";
const CRASH_DUMP_DIR: &str = "cores";
const CRASH_DUMP_HASH_LEN: usize = 64;
const CRASH_DUMP_SHARD_LEN: usize = 2;

/// Excludes `.git` directories and crash dumps laid out as
/// `<dir>/cores/<xx>/<xx>/<64 hex chars>`.
///
/// The first crash dump seen ignores `<dir>` as a whole, so dump trees are
/// not rescanned on every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFilter;

impl Filter for DefaultFilter {
    fn keep(&self, path: &Path, requests: &mut IgnoreRequests) -> bool {
        if let Some(owner) = crash_dump_owner(path) {
            debug!("Crash dump found at {}, ignoring {}", path.display(), owner.display());
            requests.ignore(owner);
            return false;
        }

        !is_vcs_metadata(path)
    }
}

fn is_vcs_metadata(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.eq_ignore_ascii_case(VCS_METADATA_DIR))
}

fn crash_dump_owner(path: &Path) -> Option<&Path> {
    let mut names = path.iter().rev();
    let hash = names.next()?;
    let second = names.next()?;
    let first = names.next()?;
    let cores = names.next()?;

    let matches = is_hex(hash, CRASH_DUMP_HASH_LEN)
        && is_hex(second, CRASH_DUMP_SHARD_LEN)
        && is_hex(first, CRASH_DUMP_SHARD_LEN)
        && cores.eq_ignore_ascii_case(CRASH_DUMP_DIR);
    if !matches {
        return None;
    }

    path.ancestors().nth(4)
}

fn is_hex(name: &OsStr, len: usize) -> bool {
    name.to_str()
        .is_some_and(|name| name.len() == len && name.bytes().all(|b| b.is_ascii_hexdigit()))
}
