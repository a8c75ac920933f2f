//! Paginated reader over the activity record store.

use domain::models::{ExportRecord, ExtractionQuery};
use domain::services::{ActivityRecordSource, StoreError};
use shared::pagination::PageKey;
use tracing::debug;

/// Single-pass keyset cursor ordered by `(start_time, id)`.
///
/// Each page resumes strictly after the last key of the previous one, so rows
/// are neither skipped nor repeated as long as the underlying view is stable.
/// A short or empty page ends the cursor. Read errors are not retried.
pub struct ExtractionCursor<'a> {
    source: &'a dyn ActivityRecordSource,
    query: ExtractionQuery,
    batch_size: u32,
    after: Option<PageKey>,
    fetched: u64,
    exhausted: bool,
}

impl<'a> ExtractionCursor<'a> {
    pub fn new(source: &'a dyn ActivityRecordSource, query: ExtractionQuery, batch_size: u32) -> Self {
        Self {
            source,
            query,
            batch_size: batch_size.max(1),
            after: None,
            fetched: 0,
            exhausted: false,
        }
    }

    /// Fetches the next page, or `None` once the cursor is drained.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ExportRecord>>, StoreError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = match self
            .source
            .fetch_page(&self.query, self.after, self.batch_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };

        if page.len() < self.batch_size as usize {
            self.exhausted = true;
        }
        if page.is_empty() {
            return Ok(None);
        }

        self.after = page.last().map(ExportRecord::page_key);
        self.fetched += page.len() as u64;

        debug!(
            user_id = self.query.user_id,
            page_len = page.len(),
            fetched = self.fetched,
            "Fetched extraction page"
        );

        Ok(Some(page))
    }

    /// Rows returned so far.
    pub fn fetched(&self) -> u64 {
        self.fetched
    }
}
