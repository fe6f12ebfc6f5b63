use chrono::{DateTime, Utc};

use crate::errors::IngestError;
use crate::youtube::RawStats;

/// Canonical video record, the shape the store persists.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub published_at: DateTime<Utc>,
    pub view_count: i64,
    pub search_term: String,
}

/// Converts a raw API payload into a canonical record, validating every
/// field the platform could report malformed. All trust-boundary checks
/// live here; callers skip the single offending video on error.
pub fn normalize(raw: RawStats, search_term: &str) -> Result<VideoRecord, IngestError> {
    let title = raw.title.ok_or_else(|| missing("title"))?;
    let channel_name = raw.channel_title.ok_or_else(|| missing("channel_name"))?;

    let published_at = raw.published_at.ok_or_else(|| missing("published_at"))?;
    let published_at = DateTime::parse_from_rfc3339(&published_at)
        .map_err(|e| IngestError::Normalization {
            field: "published_at",
            reason: format!("not a valid timestamp ({}): {:?}", e, published_at),
        })?
        .with_timezone(&Utc);

    // The API hides viewCount on some videos; the original recorded those
    // as zero rather than dropping the video.
    let view_count = match raw.view_count {
        Some(v) => v.trim().parse::<i64>().map_err(|_| IngestError::Normalization {
            field: "view_count",
            reason: format!("not an integer: {:?}", v),
        })?,
        None => 0,
    };
    if view_count < 0 {
        return Err(IngestError::Normalization {
            field: "view_count",
            reason: format!("negative value: {}", view_count),
        });
    }

    Ok(VideoRecord {
        video_id: raw.video_id,
        title,
        channel_name,
        published_at,
        view_count,
        search_term: search_term.to_string(),
    })
}

fn missing(field: &'static str) -> IngestError {
    IngestError::Normalization {
        field,
        reason: "missing from API response".to_string(),
    }
}
