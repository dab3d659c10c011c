//! Mapping from `log` facade records to flat [`Record`]s.

use std::collections::HashMap;
use std::fmt;

use log::kv::{self, Key, Value, VisitSource};
use log::Level;

use crate::core::record::Record;

pub const DEFAULT_MESSAGE_KEY: &str = "message";
pub const DEFAULT_LEVEL_KEY: &str = "level";

/// Maps a `log::Level` to the numeric value stored under the level key.
pub type LevelMapping = fn(Level) -> u8;

/// Syslog severities: error=3, warning=4, informational=6, debug=7, trace=8.
pub fn syslog_level(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug => 7,
        Level::Trace => 8,
    }
}

/// Turns a host log record into a [`Record`]. Must be pure: no shared state, no I/O.
pub trait Converter: Send + Sync + 'static {
    fn convert(&self, record: &log::Record<'_>) -> Record;
}

/// Last-chance edit of the attribute map before a record is built.
pub trait ContentModifier: Send + Sync + 'static {
    fn modify(&self, attributes: &mut HashMap<String, String>);
}

impl<F> ContentModifier for F
where
    F: Fn(&mut HashMap<String, String>) + Send + Sync + 'static,
{
    fn modify(&self, attributes: &mut HashMap<String, String>) {
        self(attributes)
    }
}

/// Default converter.
///
/// Attribute precedence, lowest first: `extra`, message, level, the record's
/// structured key/values. The modifier runs last and may change anything.
pub struct FieldConverter {
    message_key: String,
    level_key: String,
    level_mapping: LevelMapping,
    extra: HashMap<String, String>,
    modifier: Option<Box<dyn ContentModifier>>,
}

impl FieldConverter {
    pub fn new(message_key: impl Into<String>, level_key: impl Into<String>) -> Self {
        Self {
            message_key: message_key.into(),
            level_key: level_key.into(),
            level_mapping: syslog_level,
            extra: HashMap::new(),
            modifier: None,
        }
    }

    pub fn with_level_mapping(mut self, mapping: LevelMapping) -> Self {
        self.level_mapping = mapping;
        self
    }

    pub fn with_extra(mut self, extra: HashMap<String, String>) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_modifier<M: ContentModifier>(mut self, modifier: M) -> Self {
        self.modifier = Some(Box::new(modifier));
        self
    }
}

impl Default for FieldConverter {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_KEY, DEFAULT_LEVEL_KEY)
    }
}

impl fmt::Debug for FieldConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConverter")
            .field("message_key", &self.message_key)
            .field("level_key", &self.level_key)
            .field("extra", &self.extra)
            .field("modifier", &self.modifier.is_some())
            .finish()
    }
}

impl Converter for FieldConverter {
    fn convert(&self, record: &log::Record<'_>) -> Record {
        let mut attributes = self.extra.clone();
        attributes.insert(self.message_key.clone(), record.args().to_string());
        attributes.insert(
            self.level_key.clone(),
            (self.level_mapping)(record.level()).to_string(),
        );

        let mut collector = Collector(&mut attributes);
        // Collector never fails
        let _ = record.key_values().visit(&mut collector);

        if let Some(modifier) = &self.modifier {
            modifier.modify(&mut attributes);
        }
        Record::now(attributes)
    }
}

struct Collector<'a>(&'a mut HashMap<String, String>);

impl<'kvs> VisitSource<'kvs> for Collector<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.as_str().to_owned(), render_value(&value));
        Ok(())
    }
}

fn render_value(value: &Value<'_>) -> String {
    if let Some(s) = value.to_borrowed_str() {
        return s.to_owned();
    }
    if let Some(n) = value.to_i64() {
        return n.to_string();
    }
    if let Some(n) = value.to_u64() {
        return n.to_string();
    }
    if let Some(b) = value.to_bool() {
        return b.to_string();
    }
    if let Some(x) = value.to_f64() {
        return format!("{x:.6}");
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Record as LogRecord;

    #[test]
    fn message_and_syslog_level() {
        let converter = FieldConverter::default();
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("disk almost full"))
                .level(Level::Warn)
                .build(),
        );
        assert_eq!(record.get("message"), Some("disk almost full"));
        assert_eq!(record.get("level"), Some("4"));
    }

    #[test]
    fn custom_keys_and_mapping() {
        let converter = FieldConverter::new("m", "l").with_level_mapping(|_| 1);
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("hi"))
                .level(Level::Error)
                .build(),
        );
        assert_eq!(record.get("m"), Some("hi"));
        assert_eq!(record.get("l"), Some("1"));
        assert_eq!(record.get("message"), None);
    }

    #[test]
    fn key_values_override_extra() {
        let converter = FieldConverter::default().with_extra(HashMap::from([
            ("service".to_string(), "demo".to_string()),
            ("user".to_string(), "nobody".to_string()),
        ]));
        let kvs = [("user", "alice"), ("region", "eu")];
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("login"))
                .level(Level::Info)
                .key_values(&kvs)
                .build(),
        );
        assert_eq!(record.get("service"), Some("demo"));
        assert_eq!(record.get("user"), Some("alice"));
        assert_eq!(record.get("region"), Some("eu"));
        assert_eq!(record.get("level"), Some("6"));
    }

    #[test]
    fn integers_and_booleans_render_plainly() {
        let converter = FieldConverter::default();
        let ints = [("attempt", 3i64)];
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("retry"))
                .key_values(&ints)
                .build(),
        );
        assert_eq!(record.get("attempt"), Some("3"));

        let flags = [("cached", true)];
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("hit"))
                .key_values(&flags)
                .build(),
        );
        assert_eq!(record.get("cached"), Some("true"));
    }

    #[test]
    fn floats_render_with_six_decimals() {
        let converter = FieldConverter::default();
        let floats = [("ratio", 2.0f64), ("drift", -1.5f64)];
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("sampled"))
                .key_values(&floats)
                .build(),
        );
        assert_eq!(record.get("ratio"), Some("2.000000"));
        assert_eq!(record.get("drift"), Some("-1.500000"));
    }

    #[test]
    fn other_values_render_with_display() {
        let converter = FieldConverter::default();
        let peer = std::net::Ipv4Addr::new(10, 0, 0, 7);
        let failure = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let kvs = [
            ("peer", Value::from_display(&peer)),
            ("error", Value::from_display(&failure)),
        ];
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("send failed"))
                .key_values(&kvs)
                .build(),
        );
        assert_eq!(record.get("peer"), Some("10.0.0.7"));
        assert_eq!(record.get("error"), Some("connection reset"));
    }

    #[test]
    fn modifier_runs_last() {
        let converter = FieldConverter::default().with_modifier(|attrs: &mut HashMap<String, String>| {
            attrs.remove("level");
            attrs.insert("message".to_string(), "redacted".to_string());
        });
        let record = converter.convert(
            &LogRecord::builder()
                .args(format_args!("password=hunter2"))
                .build(),
        );
        assert_eq!(record.get("message"), Some("redacted"));
        assert_eq!(record.get("level"), None);
    }
}
