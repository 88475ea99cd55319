use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{info, instrument};

use crate::assemble::Day;
use crate::error::{ConfigError, StoreError};
use crate::program::ChannelSchedule;
use crate::store::ScheduleStore;

/// Schedules stored as pretty JSON objects in any [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreScheduleStore {
    object_store: Arc<dyn ObjectStore>,
    prefix: Path,
}

pub struct S3StoreConfig {
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: Option<String>,
}

impl ObjectStoreScheduleStore {
    pub fn new(object_store: Arc<dyn ObjectStore>, prefix: impl Into<Path>) -> Self {
        Self {
            object_store,
            prefix: prefix.into(),
        }
    }

    fn location(&self, day: Day, file_stem: &str) -> Path {
        self.prefix
            .child(day.as_str())
            .child(format!("{file_stem}.json"))
    }
}

/// Store rooted at a local directory, created if missing.
pub fn new_local_store(dir: &FsPath) -> Result<ObjectStoreScheduleStore, ConfigError> {
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::OutputDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let object_store = LocalFileSystem::new_with_prefix(dir).map_err(ConfigError::Store)?;

    Ok(ObjectStoreScheduleStore::new(
        Arc::new(object_store),
        Path::default(),
    ))
}

pub fn new_s3_store(
    credentials: &S3StoreConfig,
    prefix: impl Into<Path>,
) -> Result<ObjectStoreScheduleStore, ConfigError> {
    let mut builder = AmazonS3Builder::new()
        .with_access_key_id(&credentials.access_key_id)
        .with_secret_access_key(&credentials.secret_access_key)
        .with_bucket_name(&credentials.bucket);
    if let Some(region) = &credentials.region {
        builder = builder.with_region(region);
    }
    let object_store = builder.build().map_err(ConfigError::Store)?;

    Ok(ObjectStoreScheduleStore::new(Arc::new(object_store), prefix))
}

#[async_trait]
impl ScheduleStore for ObjectStoreScheduleStore {
    #[instrument(skip(self, schedule))]
    async fn save(
        &self,
        day: Day,
        file_stem: &str,
        schedule: &ChannelSchedule,
    ) -> Result<String, StoreError> {
        let location = self.location(day, file_stem);
        let body = Bytes::from(schedule.to_json()?);

        self.object_store.put(&location, body).await?;
        info!(%location, programs = schedule.schedule.len(), "saved schedule");

        Ok(location.to_string())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use object_store::memory::InMemory;
    use object_store::path::Path;
    use object_store::ObjectStore;

    use crate::assemble::Day;
    use crate::program::{ChannelSchedule, DatedProgram, RawProgram, WallTime};
    use crate::store::object::ObjectStoreScheduleStore;
    use crate::store::ScheduleStore;

    fn schedule() -> ChannelSchedule {
        ChannelSchedule {
            channel: "Food Network".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 22).unwrap(),
            schedule: vec![DatedProgram::from(RawProgram::new(
                WallTime::new(6, 0).unwrap(),
                "Chopped".to_string(),
            ))],
        }
    }

    #[tokio::test]
    pub async fn test_save_writes_pretty_json() {
        let memory = Arc::new(InMemory::new());
        let store = ObjectStoreScheduleStore::new(memory.clone(), "schedule");

        let location = store
            .save(Day::Tomorrow, "food-network", &schedule())
            .await
            .unwrap();
        assert_eq!(location, "schedule/tomorrow/food-network.json");

        let bytes = memory
            .get(&Path::from(location.as_str()))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), schedule().to_json().unwrap().as_slice());
        assert!(String::from_utf8(bytes.to_vec())
            .unwrap()
            .starts_with("{\n  \"channel\": \"Food Network\""));
    }

    #[tokio::test]
    pub async fn test_save_overwrites() {
        let memory = Arc::new(InMemory::new());
        let store = ObjectStoreScheduleStore::new(memory.clone(), Path::default());

        let mut first = schedule();
        first.schedule.clear();
        store.save(Day::Today, "food-network", &first).await.unwrap();
        let location = store.save(Day::Today, "food-network", &schedule()).await.unwrap();
        assert_eq!(location, "today/food-network.json");

        let bytes = memory
            .get(&Path::from(location.as_str()))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), schedule().to_json().unwrap().as_slice());
    }
}
