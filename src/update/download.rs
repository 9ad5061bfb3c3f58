use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::error::UpdateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f32> {
        self.total.filter(|t| *t > 0).map(|t| self.downloaded as f32 * 100.0 / t as f32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
    pub bytes: u64,
}

/// `app.exe` -> `app_backup.exe`
pub fn backup_path_for(target: &Path) -> PathBuf {
    let stem = target.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{}_backup.{}", stem, ext.to_string_lossy()),
        None => format!("{}_backup", stem),
    };
    target.with_file_name(name)
}

/// `app.exe` -> `app.exe.tmp`
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name: OsString = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

async fn fetch_to_temp<F>(client: &Client, url: &str, tmp: &Path, progress: &mut F) -> Result<u64, UpdateError>
where
    F: FnMut(DownloadProgress),
{
    let mut resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(UpdateError::Status(status.as_u16()));
    }
    let total = resp.content_length();
    let mut file = tokio::fs::File::create(tmp).await?;
    let mut downloaded = 0u64;
    progress(DownloadProgress { downloaded, total });
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress(DownloadProgress { downloaded, total });
    }
    file.flush().await?;
    file.sync_all().await?;

    if downloaded == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty download").into());
    }
    if let Some(t) = total {
        if downloaded != t {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("truncated download: {} of {} bytes", downloaded, t),
            )
            .into());
        }
    }
    Ok(downloaded)
}

fn install(tmp: &Path, target: &Path) -> Result<Option<PathBuf>, UpdateError> {
    mark_executable(tmp)?;
    let backup = if target.exists() {
        let b = backup_path_for(target);
        if b.exists() {
            std::fs::remove_file(&b)?;
        }
        // A running executable can be renamed but not overwritten on Windows.
        std::fs::rename(target, &b)?;
        Some(b)
    } else {
        None
    };

    if let Err(e) = std::fs::rename(tmp, target) {
        if let Some(b) = &backup {
            if let Err(re) = std::fs::rename(b, target) {
                log::error!("[UPDATE] Failed to restore backup {}: {}", b.display(), re);
            }
        }
        return Err(e.into());
    }
    Ok(backup)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Streams `url` into `<target>.tmp`, then swaps it into place keeping the
/// previous file as `<stem>_backup.<ext>`. The target is untouched when the
/// download fails.
pub async fn download_update<F>(client: &Client, url: &str, target: &Path, mut progress: F) -> Result<InstallReport, UpdateError>
where
    F: FnMut(DownloadProgress),
{
    let tmp = temp_path_for(target);
    log::info!("[UPDATE] Downloading {} -> {}", url, tmp.display());
    let bytes = match fetch_to_temp(client, url, &tmp, &mut progress).await {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            log::error!("[UPDATE] Download failed: {}", e);
            return Err(e);
        }
    };

    match install(&tmp, target) {
        Ok(backup) => {
            log::info!("[UPDATE] Installed {} ({} bytes)", target.display(), bytes);
            Ok(InstallReport { path: target.to_path_buf(), backup, bytes })
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            log::error!("[UPDATE] Install failed: {}", e);
            Err(e)
        }
    }
}

/// Puts `<stem>_backup.<ext>` back in place of `target`. Returns false when
/// there is no backup.
pub fn restore_backup(target: &Path) -> Result<bool, UpdateError> {
    let backup = backup_path_for(target);
    if !backup.exists() {
        return Ok(false);
    }
    if target.exists() {
        std::fs::remove_file(target)?;
    }
    std::fs::rename(&backup, target)?;
    log::info!("[UPDATE] Restored {} from backup", target.display());
    Ok(true)
}

/// Starts the freshly installed executable detached from this process.
pub fn relaunch(path: &Path) -> std::io::Result<Child> {
    log::info!("[UPDATE] Relaunching {}", path.display());
    let mut cmd = Command::new(path);
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }
    cmd.spawn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_paths() {
        let t = Path::new("/opt/app/ExchangeUnsen.exe");
        assert_eq!(backup_path_for(t), PathBuf::from("/opt/app/ExchangeUnsen_backup.exe"));
        assert_eq!(temp_path_for(t), PathBuf::from("/opt/app/ExchangeUnsen.exe.tmp"));
        assert_eq!(backup_path_for(Path::new("bin/tool")), PathBuf::from("bin/tool_backup"));
    }

    #[test]
    fn restore_without_backup_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("app.bin");
        std::fs::write(&target, b"v2").unwrap();
        assert!(!restore_backup(&target).unwrap());
        std::fs::write(backup_path_for(&target), b"v1").unwrap();
        assert!(restore_backup(&target).unwrap());
        assert_eq!(std::fs::read(&target).unwrap(), b"v1");
    }

    #[test]
    fn failed_install_keeps_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("app.bin");
        std::fs::write(&target, b"v1").unwrap();
        let missing = temp_path_for(&target);
        assert!(install(&missing, &target).is_err());
        assert_eq!(std::fs::read(&target).unwrap(), b"v1");
        assert!(!backup_path_for(&target).exists());
    }

    #[cfg(unix)]
    #[test]
    fn installed_file_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("app.bin");
        let tmp = temp_path_for(&target);
        std::fs::write(&tmp, b"v2").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).unwrap();
        assert_eq!(install(&tmp, &target).unwrap(), None);
        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
    }

    #[test]
    fn progress_percent() {
        assert_eq!(DownloadProgress { downloaded: 5, total: Some(10) }.percent(), Some(50.0));
        assert_eq!(DownloadProgress { downloaded: 5, total: None }.percent(), None);
    }
}
