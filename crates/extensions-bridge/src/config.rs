//! Bridge delivery settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Pause between a fresh injection and the retried request.
    #[serde(with = "millis", default = "default_settle")]
    pub settle_after_inject: Duration,
    /// Capacity of the bridge event channel.
    #[serde(default = "default_capacity")]
    pub event_capacity: usize,
}

fn default_settle() -> Duration {
    Duration::from_millis(0)
}

fn default_capacity() -> usize {
    64
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            settle_after_inject: default_settle(),
            event_capacity: default_capacity(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
