use std::{io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

/// Serializes `value` with 4 space indentation. Non-ASCII names are written as is.
pub fn to_pretty_json(value: &impl Serialize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

fn parse_or_default<T: DeserializeOwned + Default>(path: &Path, content: &str) -> Result<T> {
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(content).with_context(|| format!("Malformed json in {path:?}"))
}

/// Reads a json file. A missing file is `None`, an empty one is the default value.
pub async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<Option<T>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {path:?}")),
    };
    file.lock_shared()?;
    let mut content = String::new();
    let read = file.read_to_string(&mut content).await;
    file.unlock_async().await?;
    read?;
    parse_or_default(path, &content).map(Some)
}

/// Read-modify-rewrite of a whole json file under an exclusive lock. The file is created when
/// missing.
pub async fn update_json<T, F>(path: &Path, update: F) -> Result<()>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T),
{
    let mut file = open_for_rewrite(path).await?;
    file.lock_exclusive()?;
    let result = rewrite_locked(&mut file, path, update).await;
    file.unlock_async().await?;
    result
}

async fn rewrite_locked<T, F>(file: &mut File, path: &Path, update: F) -> Result<()>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T),
{
    let mut content = String::new();
    file.read_to_string(&mut content).await?;
    let mut value: T = parse_or_default(path, &content)?;
    update(&mut value);

    replace_content(file, &to_pretty_json(&value)?).await
}

/// Opens without truncating, truncation happens once the lock is held.
async fn open_for_rewrite(path: &Path) -> Result<File> {
    File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {path:?}"))
}

async fn replace_content(file: &mut File, buffer: &[u8]) -> Result<()> {
    file.rewind().await?;
    file.set_len(0).await?;
    file.write_all(buffer).await?;
    file.flush().await?;
    Ok(())
}

/// Overwrites a json file with `value` under an exclusive lock.
pub async fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let buffer = to_pretty_json(value)?;
    let mut file = open_for_rewrite(path).await?;
    file.lock_exclusive()?;
    let result = replace_content(&mut file, &buffer)
        .await
        .with_context(|| format!("Failed to write {path:?}"));
    file.unlock_async().await?;
    result
}

/// Removes everything inside `dir` while keeping the directory. A missing directory is already
/// clear.
pub async fn clear_folder(dir: &Path) -> Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        debug!("Removing {path:?}");
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{clear_folder, read_json, to_pretty_json, update_json, write_json};

    #[tokio::test]
    async fn test_read_missing_file_is_none() -> Result<()> {
        let dir = tempdir()?;
        let value = read_json::<BTreeMap<String, u64>>(&dir.path().join("absent.json")).await?;
        assert!(value.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_creates_and_rewrites() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data.json");

        update_json::<BTreeMap<String, u64>, _>(&path, |map| {
            map.insert("long application name".into(), 100);
        })
        .await?;
        update_json::<BTreeMap<String, u64>, _>(&path, |map| {
            map.clear();
            map.insert("x".into(), 1);
        })
        .await?;

        // A shorter rewrite must not leave bytes of the previous content behind.
        let raw = std::fs::read_to_string(&path)?;
        assert_eq!(raw, "{\n    \"x\": 1\n}");
        let value = read_json::<BTreeMap<String, u64>>(&path).await?.unwrap();
        assert_eq!(value.get("x"), Some(&1));
        Ok(())
    }

    #[tokio::test]
    async fn test_write_replaces_content_and_releases_lock() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("summary.json");
        std::fs::write(&path, "{\n    \"a much longer application name\": 100\n}")?;

        let mut map = BTreeMap::new();
        map.insert("x".to_string(), 1u64);
        write_json(&path, &map).await?;
        assert_eq!(std::fs::read_to_string(&path)?, "{\n    \"x\": 1\n}");

        // Would block forever if the exclusive lock were still held.
        update_json::<BTreeMap<String, u64>, _>(&path, |map| {
            map.insert("y".into(), 2);
        })
        .await?;
        let value = read_json::<BTreeMap<String, u64>>(&path).await?.unwrap();
        assert_eq!(value.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_file_reads_as_default() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "")?;
        let value = read_json::<BTreeMap<String, u64>>(&path).await?.unwrap();
        assert!(value.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"a\": ")?;
        assert!(read_json::<BTreeMap<String, u64>>(&path).await.is_err());
        Ok(())
    }

    #[test]
    fn test_pretty_json_keeps_unicode() -> Result<()> {
        let mut map = BTreeMap::new();
        map.insert("Телеграм", 3u64);
        let raw = String::from_utf8(to_pretty_json(&map)?)?;
        assert_eq!(raw, "{\n    \"Телеграм\": 3\n}");
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_folder() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("a.json"), "{}")?;
        std::fs::create_dir(dir.path().join("nested"))?;
        std::fs::write(dir.path().join("nested").join("b.json"), "{}")?;

        clear_folder(dir.path()).await?;
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

        clear_folder(&dir.path().join("missing")).await?;
        Ok(())
    }
}
