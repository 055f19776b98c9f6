use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::{here, Error, ErrorLocation};

/// On-disk store for uploaded image binaries
///
/// Files written here are never deleted by the service; records rejected
/// after the write leave an orphaned file behind
#[must_use]
#[derive(Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Open the store, creating the upload directory if needed
    pub async fn init<T>(dir: T) -> Result<Self, Error>
    where
        T: AsRef<Path>,
    {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.location(here!())?;

        info!("Uploaded files are stored at: `{}`", dir.display());

        Ok(Self { dir })
    }

    /// Directory uploaded files are served from
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write uploaded bytes under a generated name, returning the stored path
    pub async fn save<T>(&self, original_name: &str, bytes: T) -> Result<PathBuf, Error>
    where
        T: AsRef<[u8]>,
    {
        let path = self.dir.join(generate_file_name(original_name));
        fs::write(&path, bytes.as_ref()).await.location(here!())?;

        Ok(path)
    }
}

fn generate_file_name(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!(
        "image-{}-{}{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn file_name_keeps_the_extension() {
        let name = generate_file_name("holiday.JPG");

        assert!(name.starts_with("image-"));
        assert!(name.ends_with(".JPG"));
    }

    #[test]
    fn file_name_without_extension() {
        let name = generate_file_name("holiday");

        assert!(!name.contains('.'));
    }

    #[test]
    fn file_names_are_unique() {
        assert_ne!(generate_file_name("a.png"), generate_file_name("a.png"));
    }

    #[tokio::test]
    async fn save_writes_the_bytes() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let store = ImageStore::init(dir.path().join("uploads")).await?;

        let path = store.save("shot.png", b"not-really-a-png").await?;

        assert_eq!(fs::read(&path).await?, b"not-really-a-png");
        assert_eq!(path.parent(), Some(store.dir()));

        Ok(())
    }
}
