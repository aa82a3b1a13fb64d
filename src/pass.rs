//! Raw pass records as they come out of a pass store.
//!
//! Field names follow the store documents (camelCase). Several concepts have
//! more than one accepted source field; the resolvers below pick the first
//! present one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One drive-level roughness measurement for a vehicle on a segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPass {
    pub city_id: Option<String>,

    pub segment_id: Option<String>,
    pub cell_id: Option<String>,
    pub vehicle_hash: Option<String>,

    #[serde(deserialize_with = "lenient::millis")]
    pub event_time_ms: Option<f64>,
    #[serde(deserialize_with = "lenient::millis")]
    pub timestamp_ms: Option<f64>,

    #[serde(deserialize_with = "lenient::number")]
    pub weighted_energy_sum: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub roughness_energy_sum: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub energy_sum: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub sample_count: Option<f64>,

    pub road_type_hint: Option<String>,
    pub road_type: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub vehicle_model_year: Option<f64>,
}

impl RawPass {
    /// Segment key: `segmentId`, else `cellId`. Blank strings count as absent.
    pub fn segment_key(&self) -> Option<&str> {
        non_blank(&self.segment_id).or_else(|| non_blank(&self.cell_id))
    }

    pub fn vehicle_key(&self) -> Option<&str> {
        non_blank(&self.vehicle_hash)
    }

    /// Event time in epoch milliseconds: `eventTimeMs`, else `timestampMs`.
    pub fn event_time(&self) -> Option<f64> {
        self.event_time_ms
            .filter(|t| t.is_finite())
            .or(self.timestamp_ms.filter(|t| t.is_finite()))
    }

    /// Energy sum, weighted preferred over unweighted.
    pub fn energy(&self) -> Option<f64> {
        self.weighted_energy_sum
            .or(self.roughness_energy_sum)
            .or(self.energy_sum)
    }

    /// Road-type vote carried by this pass, if it is a recognised type.
    pub fn road_type_vote(&self) -> Option<RoadType> {
        self.road_type_hint
            .as_deref()
            .or(self.road_type.as_deref())
            .and_then(RoadType::parse)
    }

    /// Model year as a whole year, if it is a plausible number.
    pub fn model_year(&self) -> Option<i32> {
        self.vehicle_model_year
            .filter(|y| y.is_finite() && *y > 0.0 && *y < 10_000.0)
            .map(|y| y.trunc() as i32)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Numeric field decoding that never fails on content: numbers pass through,
/// numeric strings are parsed, and anything else reads as absent.
mod lenient {
    use chrono::DateTime;
    use serde::de::{Deserializer, Error, IgnoredAny, MapAccess, SeqAccess, Visitor};
    use std::fmt;

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        d.deserialize_option(LenientNumber { timestamps: false })
    }

    /// Like [`number`], but RFC 3339 strings (stored timestamps) are read as
    /// epoch milliseconds.
    pub fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        d.deserialize_option(LenientNumber { timestamps: true })
    }

    struct LenientNumber {
        timestamps: bool,
    }

    impl LenientNumber {
        fn parse(&self, raw: &str) -> Option<f64> {
            let raw = raw.trim();
            raw.parse::<f64>().ok().or_else(|| {
                self.timestamps
                    .then(|| DateTime::parse_from_rfc3339(raw).ok())
                    .flatten()
                    .map(|t| t.timestamp_millis() as f64)
            })
        }
    }

    impl<'de> Visitor<'de> for LenientNumber {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an optional number")
        }

        fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_bool<E: Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_f64<E: Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(self.parse(v))
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(None)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(None)
        }
    }
}

/// Road classification used for the within-type ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Highway,
    City,
}

impl RoadType {
    /// Parses a hint; `unknown` and anything unrecognised yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "highway" => Some(RoadType::Highway),
            "city" => Some(RoadType::City),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadType::Highway => "highway",
            RoadType::City => "city",
        }
    }
}

impl fmt::Display for RoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
