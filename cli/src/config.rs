use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Overrides the platform data directory.
pub const DATA_DIR_ENV: &str = "WEIGH_DATA_DIR";

pub struct Config {
    pub db_path: PathBuf,
    session_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "weigh")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::in_dir(&data_dir)
    }

    pub fn in_dir(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            db_path: data_dir.join("weigh.db"),
            session_path: data_dir.join("session"),
        })
    }

    /// The logged-in user id, if any.
    pub fn session_user(&self) -> Result<Option<String>> {
        if !self.session_path.exists() {
            return Ok(None);
        }
        let id = std::fs::read_to_string(&self.session_path)
            .context("Failed to read session file")?;
        let id = id.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }

    pub fn require_user(&self) -> Result<String> {
        match self.session_user()? {
            Some(id) => Ok(id),
            None => bail!("Not logged in. Run `weigh login <email>` first"),
        }
    }

    pub fn save_session(&self, user_id: &str) -> Result<()> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.session_path)
            .context("Failed to write session file")?;

        // The mode only applies on creation.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }
        file.write_all(user_id.as_bytes())
            .context("Failed to write session file")?;
        Ok(())
    }

    /// Returns false when there was no session to clear.
    pub fn clear_session(&self) -> Result<bool> {
        if !self.session_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.session_path).context("Failed to remove session file")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("weigh");
        let config = Config::in_dir(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(config.db_path, dir.join("weigh.db"));
    }

    #[test]
    fn test_session_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path()).unwrap();

        assert_eq!(config.session_user().unwrap(), None);
        assert!(config.require_user().is_err());
        assert!(!config.clear_session().unwrap());

        config.save_session("abc-123").unwrap();
        assert_eq!(config.session_user().unwrap().as_deref(), Some("abc-123"));
        assert_eq!(config.require_user().unwrap(), "abc-123");

        assert!(config.clear_session().unwrap());
        assert_eq!(config.session_user().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path()).unwrap();
        let path = tmp.path().join("session");

        config.save_session("abc-123").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // An older, world-readable file is tightened before the id is written.
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        config.save_session("def-456").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(config.session_user().unwrap().as_deref(), Some("def-456"));
    }

    #[test]
    fn test_blank_session_file_is_logged_out() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("session"), "  \n").unwrap();
        assert_eq!(config.session_user().unwrap(), None);
    }
}
