pub mod checker;
pub mod download;
pub mod manifest;
pub mod publish;
pub mod version;

pub use checker::{build_client, UpdateCheck, UpdateChecker};
pub use download::{download_update, relaunch, restore_backup, DownloadProgress, InstallReport};
pub use manifest::{generate_manifest, parse_manifest, validate_manifest, ReleaseInfo, VersionManifest};
pub use publish::publish_version;
pub use version::{compare_versions, is_newer, VersionStatus};
