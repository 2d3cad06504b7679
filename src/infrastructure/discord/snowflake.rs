//! Snowflake 与时间互转

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::domain::Snowflake;

/// Discord 纪元（2015-01-01T00:00:00Z）毫秒
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// 时间对应的最小 Snowflake；纪元之前取 0
pub fn from_datetime(dt: &DateTime<Utc>) -> Snowflake {
    let ms = dt.timestamp_millis() - DISCORD_EPOCH_MS;
    if ms <= 0 {
        0
    } else {
        (ms as u64) << 22
    }
}

/// Snowflake 的创建时间
pub fn to_datetime(id: Snowflake) -> DateTime<Utc> {
    let ms = (id >> 22) as i64 + DISCORD_EPOCH_MS;
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// 解析采集区间边界：纯数字视为 Snowflake，否则按 ISO-8601 时间解析（无时区视为 UTC）
pub fn parse_bound(raw: &str) -> Result<Snowflake> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse()
            .with_context(|| format!("invalid snowflake: {}", raw));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(from_datetime(&dt.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(from_datetime(&naive.and_utc()));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("invalid date")?;
        return Ok(from_datetime(&midnight.and_utc()));
    }

    anyhow::bail!("expected a snowflake ID or ISO-8601 timestamp, got '{}'", raw)
}
