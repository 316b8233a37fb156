use serde::{Deserialize, Serialize};

/// Distance metric selected for newly built indexes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricSetting {
    /// Squared Euclidean distance, ascending.
    L2,
    /// Inner product similarity, descending.
    #[default]
    InnerProduct,
}

/// What to do when a persisted snapshot cannot be read back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnCorruptSetting {
    /// Move the unreadable files aside and start the tenant empty.
    #[default]
    Quarantine,
    /// Refuse to open the tenant.
    Fail,
}

/// Vector index and snapshot settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSettings {
    /// Root directory holding one sub-directory per tenant (may contain `~`).
    pub data_dir: String,
    /// Metric for new indexes. Existing snapshots keep their own metric
    /// until rebuilt.
    pub metric: MetricSetting,
    /// Corrupt snapshot policy.
    pub on_corrupt: OnCorruptSetting,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.botkb/indexes".to_string(),
            metric: MetricSetting::default(),
            on_corrupt: OnCorruptSetting::default(),
        }
    }
}

impl IndexSettings {
    /// Resolve the data directory, expanding `~/` to the home directory.
    pub fn resolved_data_dir(&self) -> String {
        if self.data_dir.starts_with("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return format!("{}{}", home, &self.data_dir[1..]);
            }
        }
        self.data_dir.clone()
    }
}
