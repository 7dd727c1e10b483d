mod buildinfo;
mod lockfile;
mod rebuild;
mod transactions;

pub use buildinfo::{BuildInfo, BuildRepo, ReposType, BUILD_INFO_VERSION};
pub use lockfile::{LockManifest, Profile, RepoEntry, LOCK_VERSION};
pub use rebuild::{decide_rebuild, fingerprint_dir, fingerprint_file, RebuildReason};
pub use transactions::{Transaction, TrxId};
