use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single converted log event: a wall-clock timestamp plus flat string attributes.
///
/// Records are immutable once built. Ownership moves into the delivery
/// service on successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    timestamp: SystemTime,
    attributes: HashMap<String, String>,
}

impl Record {
    pub fn new(timestamp: SystemTime, attributes: HashMap<String, String>) -> Self {
        Self {
            timestamp,
            attributes,
        }
    }

    /// Builds a record stamped with the current wall-clock time.
    pub fn now(attributes: HashMap<String, String>) -> Self {
        Self::new(SystemTime::now(), attributes)
    }

    #[inline]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Milliseconds since the unix epoch; zero for pre-epoch timestamps.
    pub fn unix_millis(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    #[inline]
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn into_attributes(self) -> HashMap<String, String> {
        self.attributes
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record::now(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
