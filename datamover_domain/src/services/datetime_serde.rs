// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Datetime Serialization
//!
//! RFC 3339 serde helpers for timestamps. All persisted timestamps in the
//! system (execution snapshots, event logs, manifests) use RFC 3339 UTC with
//! second precision kept as emitted by chrono, so snapshots diff cleanly and
//! sort lexicographically.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

/// Helpers for `Option<DateTime<Utc>>` fields.
pub mod optional {
    use super::*;
    use serde::Serialize;

    pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        dt.map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            None => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "super")]
        at: DateTime<Utc>,
        #[serde(with = "super::optional")]
        maybe: Option<DateTime<Utc>>,
    }

    /// Tests RFC 3339 round-tripping for required and optional timestamps.
    #[test]
    fn test_rfc3339_round_trip() {
        let original = Stamped {
            at: Utc::now(),
            maybe: Some(Utc::now()),
        };
        let json = serde_json::to_string(&original).unwrap();
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(original.at.timestamp_millis(), back.at.timestamp_millis());
        assert!(back.maybe.is_some());

        let none = Stamped {
            at: Utc::now(),
            maybe: None,
        };
        let json = serde_json::to_string(&none).unwrap();
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert!(back.maybe.is_none());
    }
}
