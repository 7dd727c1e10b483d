mod config;
mod layout;
mod repopath;

pub use config::{BuildConfig, BuildStrategy, Config, EditConfig, GetConfig};
pub use layout::{default_user_layout, DataLayout};
pub use repopath::{RepoPath, DEFAULT_HOST};
