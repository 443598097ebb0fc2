use std::{fmt, sync::OnceLock};

use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// RFC3339 timestamps in the local offset detected at first use; UTC if detection fails.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rfc3339Local;

impl Rfc3339Local {
    pub(crate) fn new() -> Self {
        LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC));
        Self
    }
}

impl FormatTime for Rfc3339Local {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let offset = LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
        match OffsetDateTime::now_utc().to_offset(offset).format(&Rfc3339) {
            Ok(ts) => write!(w, "{ts} "),
            Err(_) => write!(w, "<invalid-time> "),
        }
    }
}
