use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{error, info};

use crate::error::SnapshotError;
use crate::models::record::AbnormalPodRecord;

/// Filesystem-backed snapshot persistence, one JSON file per calendar date.
/// The file name derives from the date alone, so repeated saves within one
/// day overwrite the same resource.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("abnormal_pods_{}.json", date.format("%Y%m%d")))
    }

    /// Serialize `records` to the date-keyed file via write-to-temporary
    /// then atomic rename, so no reader ever observes a partial snapshot.
    pub fn save(&self, records: &[AbnormalPodRecord], date: NaiveDate) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(date);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        info!("saved {} record(s) to {}", records.len(), path.display());
        Ok(())
    }

    /// Load the snapshot for `date`. An absent, unreadable, or unparseable
    /// file is an empty collection, never an error to the caller.
    pub fn load(&self, date: NaiveDate) -> Vec<AbnormalPodRecord> {
        let path = self.path_for(date);
        if !path.exists() {
            return Vec::new();
        }
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                error!("could not read snapshot {}: {}", path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(records) => records,
            Err(e) => {
                error!("could not parse snapshot {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(pod: &str, reasons: &str) -> AbnormalPodRecord {
        AbnormalPodRecord {
            timestamp: Utc::now().to_rfc3339(),
            cluster: "prod".to_string(),
            context: "prod-admin".to_string(),
            namespace: "default".to_string(),
            pod: pod.to_string(),
            status: "Failed".to_string(),
            node: "node-1".to_string(),
            reasons: reasons.to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    #[test]
    fn round_trip_preserves_records_and_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let records = vec![record("z-pod", "Restarts(2)"), record("a-pod", "N/A")];

        store.save(&records, date()).expect("save");
        let loaded = store.load(date());

        assert_eq!(loaded, records);
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        assert!(store.load(date()).is_empty());
    }

    #[test]
    fn corrupt_snapshot_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        store.save(&[record("p", "N/A")], date()).expect("save");

        let path = dir.path().join("abnormal_pods_20240601.json");
        fs::write(&path, "{ not json").expect("corrupt file");

        assert!(store.load(date()).is_empty());
    }

    #[test]
    fn same_date_save_overwrites_completely() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());

        store
            .save(&[record("p1", "N/A"), record("p2", "N/A")], date())
            .expect("first save");
        store.save(&[record("p3", "N/A")], date()).expect("second save");

        let loaded = store.load(date());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].pod, "p3");
    }

    #[test]
    fn no_temporary_file_survives_a_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        store.save(&[record("p", "N/A")], date()).expect("save");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn dates_map_to_distinct_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let other = NaiveDate::from_ymd_opt(2024, 6, 2).expect("valid date");

        store.save(&[record("p1", "N/A")], date()).expect("save day 1");
        store.save(&[record("p2", "N/A")], other).expect("save day 2");

        assert_eq!(store.load(date())[0].pod, "p1");
        assert_eq!(store.load(other)[0].pod, "p2");
    }
}
