//! Key-value key types and traits.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::Error;

/// Marker trait for KV key types.
///
/// This trait defines how keys are formatted for storage in NATS KV.
pub trait KvKey: fmt::Debug + fmt::Display + FromStr + Clone + Send + Sync + 'static {}

/// Key for task records, the hyphenated task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey(pub Uuid);

impl KvKey for TaskKey {}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TaskKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s).map_err(|e| Error::operation("parse_task_key", e.to_string()))?;
        Ok(Self(id))
    }
}

impl From<Uuid> for TaskKey {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_key_roundtrip() {
        let key = TaskKey(Uuid::now_v7());
        let parsed: TaskKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_task_key_is_hyphenated() {
        let key = TaskKey(Uuid::nil());
        assert_eq!(key.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_invalid_task_key() {
        assert!("not-a-task".parse::<TaskKey>().is_err());
    }
}
