use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::{
    fs::operations::{clear_folder, read_json, update_json, write_json},
    usage::table::UsageTable,
    utils::time::date_to_record_name,
};

use super::{DailySource, UsageStore};

const ALL_TIME_FILE: &str = "stats.json";
const DAILY_DIR: &str = "jsons";
const WEEKLY_SUMMARY_FILE: &str = "weekly_summary.json";

/// The main realization of [UsageStore], keeping tables as json files under an application
/// directory.
pub struct JsonUsageStore {
    root: PathBuf,
}

impl JsonUsageStore {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(DAILY_DIR))?;
        Ok(Self { root })
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.daily_dir()
            .join(format!("{}.json", date_to_record_name(date)))
    }

    /// Older trackers named daily buckets without the `.json` extension.
    pub fn legacy_day_path(&self, date: NaiveDate) -> PathBuf {
        self.daily_dir().join(date_to_record_name(date))
    }

    pub fn all_time_path(&self) -> PathBuf {
        self.root.join(ALL_TIME_FILE)
    }

    pub fn weekly_summary_path(&self) -> PathBuf {
        self.daily_dir().join(WEEKLY_SUMMARY_FILE)
    }

    fn daily_dir(&self) -> PathBuf {
        self.root.join(DAILY_DIR)
    }

    /// Renames an extensionless bucket of `date` so new seconds are added to its counts.
    async fn adopt_legacy_day(&self, date: NaiveDate) -> Result<()> {
        let path = self.day_path(date);
        let legacy = self.legacy_day_path(date);
        if !tokio::fs::try_exists(&path).await? && tokio::fs::try_exists(&legacy).await? {
            info!("Renaming legacy bucket {legacy:?} to {path:?}");
            tokio::fs::rename(&legacy, &path).await?;
        }
        Ok(())
    }

    async fn increment_file(path: &Path, app_name: &str) -> Result<()> {
        update_json::<UsageTable, _>(path, |table| table.increment(app_name)).await
    }
}

impl DailySource for JsonUsageStore {
    async fn load_day(&self, date: NaiveDate) -> Result<Option<UsageTable>> {
        let path = self.day_path(date);
        debug!("Loading daily bucket {path:?}");
        match read_json::<UsageTable>(&path).await? {
            Some(table) => Ok(Some(table)),
            None => read_json(&self.legacy_day_path(date)).await,
        }
    }
}

impl UsageStore for JsonUsageStore {
    #[instrument(skip(self))]
    async fn record(&mut self, date: NaiveDate, app_name: &str) -> Result<()> {
        // The daily dir might have been removed by hand while tracking.
        tokio::fs::create_dir_all(self.daily_dir()).await?;
        self.adopt_legacy_day(date).await?;
        Self::increment_file(&self.day_path(date), app_name).await?;
        Self::increment_file(&self.all_time_path(), app_name).await
    }

    async fn load_all_time(&self) -> Result<UsageTable> {
        Ok(read_json(&self.all_time_path()).await?.unwrap_or_default())
    }

    async fn save_weekly_summary(&mut self, table: &UsageTable) -> Result<()> {
        tokio::fs::create_dir_all(self.daily_dir()).await?;
        write_json(&self.weekly_summary_path(), table).await
    }

    async fn clear(&mut self) -> Result<()> {
        clear_folder(&self.daily_dir()).await?;
        write_json(&self.all_time_path(), &UsageTable::new()).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::{
        storage::{DailySource, UsageStore},
        usage::table::UsageTable,
    };

    use super::JsonUsageStore;

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();

    #[tokio::test]
    async fn test_record_updates_day_and_all_time() -> Result<()> {
        let dir = tempdir()?;
        let mut store = JsonUsageStore::new(dir.path().to_owned())?;

        store.record(TEST_DATE, "Safari").await?;
        store.record(TEST_DATE, "Safari").await?;
        store.record(TEST_DATE.succ_opt().unwrap(), "Mail").await?;

        let day = store.load_day(TEST_DATE).await?.unwrap();
        assert_eq!(day, UsageTable::from_iter([("Safari", 2u64)]));

        let all_time = store.load_all_time().await?;
        assert_eq!(all_time, UsageTable::from_iter([("Safari", 2u64), ("Mail", 1)]));

        assert!(dir.path().join("jsons").join("2018-07-04.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_day_is_none() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonUsageStore::new(dir.path().to_owned())?;
        assert!(store.load_day(TEST_DATE).await?.is_none());
        assert!(store.load_all_time().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reads_files_written_by_hand() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonUsageStore::new(dir.path().to_owned())?;
        std::fs::write(
            store.day_path(TEST_DATE),
            "{\n    \"Telegram\": 12,\n    \"Finder\": 3\n}",
        )?;

        let day = store.load_day(TEST_DATE).await?.unwrap();
        assert_eq!(
            day.iter().collect::<Vec<_>>(),
            vec![("Telegram", 12), ("Finder", 3)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_extensionless_buckets_are_read_and_continued() -> Result<()> {
        let dir = tempdir()?;
        let mut store = JsonUsageStore::new(dir.path().to_owned())?;
        let legacy = dir.path().join("jsons").join("2018-07-04");
        std::fs::write(&legacy, "{\"Telegram\": 12}")?;

        assert_eq!(
            store.load_day(TEST_DATE).await?,
            Some(UsageTable::from_iter([("Telegram", 12u64)]))
        );

        store.record(TEST_DATE, "Telegram").await?;
        assert!(!legacy.exists());
        assert_eq!(
            store.load_day(TEST_DATE).await?,
            Some(UsageTable::from_iter([("Telegram", 13u64)]))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let mut store = JsonUsageStore::new(dir.path().to_owned())?;
        store.record(TEST_DATE, "Code").await?;
        store
            .save_weekly_summary(&UsageTable::from_iter([("Code", 1u64)]))
            .await?;

        store.clear().await?;
        store.clear().await?;

        assert!(store.load_day(TEST_DATE).await?.is_none());
        assert!(store.load_all_time().await?.is_empty());
        assert!(!store.weekly_summary_path().exists());
        assert_eq!(std::fs::read_to_string(store.all_time_path())?, "{}");

        store.record(TEST_DATE, "Code").await?;
        assert_eq!(store.load_day(TEST_DATE).await?.unwrap().get("Code"), Some(1));
        Ok(())
    }
}
