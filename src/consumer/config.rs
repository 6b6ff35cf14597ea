use chrono::{Duration, Local, NaiveDateTime, TimeZone};

use crate::error::{Error, Result};

use super::ConsumeFromWhere;

/// The `yyyyMMddHHmmss` format of consume timestamps.
pub const CONSUME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug)]
pub struct Config {
    pub group: String,
    pub consume_from_where: ConsumeFromWhere,
    pub consume_timestamp: String,
    pub retry_topic_prefix: String,
}

/// Parses a `yyyyMMddHHmmss` consume timestamp, interpreted in the
/// local time zone, into unix milliseconds.
pub fn parse_consume_timestamp(s: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(s, CONSUME_TIMESTAMP_FORMAT)
        .map_err(|_| Error::InvalidTimestamp(s.to_owned()))?;
    // ~ a local time skipped by a DST transition does not exist;
    // ambiguous ones resolve to their earlier instant
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| Error::InvalidTimestamp(s.to_owned()))
}

/// Half an hour before now, formatted as a consume timestamp.
#[must_use]
pub fn default_consume_timestamp() -> String {
    (Local::now() - Duration::minutes(30))
        .format(CONSUME_TIMESTAMP_FORMAT)
        .to_string()
}
