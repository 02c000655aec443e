//! Timestamp helpers: RFC 3339 serde for stored records and the short form shown in listings.

use serde::{Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

/// Deserialize an RFC 3339 formatted string into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis(datetime: OffsetDateTime) -> i128 {
    datetime.unix_timestamp_nanos() / 1_000_000
}

/// Short human form used in the thread list, e.g. `Oct 19, 3:04 PM`.
pub fn short_display(datetime: OffsetDateTime) -> String {
    let format = format_description!(
        "[month repr:short] [day padding:none], [hour repr:12 padding:none]:[minute] [period]"
    );
    datetime
        .format(format)
        .unwrap_or_else(|_| datetime.date().to_string())
}
