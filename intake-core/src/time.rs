//! Time utilities: zone resolution and zone-aware "now".

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

/// Resolve an IANA zone name like "America/Chicago".
pub fn resolve_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// A UTC instant re-expressed in the caller's zone, offset preserved.
pub fn now_in_zone(now: DateTime<Utc>, tz: Tz) -> DateTime<FixedOffset> {
    now.with_timezone(&tz).fixed_offset()
}
