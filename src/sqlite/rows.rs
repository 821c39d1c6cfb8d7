use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::{Row, Rows};

use crate::context::CallContext;
use crate::spy::SqlSpy;
use crate::types::ObjectKind;

/// Result cursor; each step is logged on the resultset channel.
///
/// SQLite does a query's work while it is stepped. The time spent in every
/// [`SpyRows::next`] is summed and reported as the query's timing when the cursor
/// finishes or is dropped.
pub struct SpyRows<'stmt> {
    rows: Rows<'stmt>,
    spy: Arc<SqlSpy>,
    /// The `executeQuery` call the timing line belongs to
    query: CallContext,
    sql: String,
    elapsed: Duration,
    finished: bool,
}

impl<'stmt> SpyRows<'stmt> {
    pub(crate) fn new(
        rows: Rows<'stmt>,
        spy: Arc<SqlSpy>,
        query: CallContext,
        sql: String,
    ) -> Self {
        Self {
            rows,
            spy,
            query,
            sql,
            elapsed: Duration::ZERO,
            finished: false,
        }
    }

    /// Time spent stepping the cursor so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Step to the next row.
    ///
    /// # Errors
    ///
    /// Returns the driver's error unchanged.
    pub fn next(&mut self) -> Result<Option<&Row<'stmt>>, rusqlite::Error> {
        let ctx = CallContext::new(ObjectKind::ResultSet, self.query.connection_id, "next");
        let start = Instant::now();
        let outcome = self.rows.next();
        self.elapsed += start.elapsed();

        match outcome {
            Ok(row) => {
                if row.is_none() && !self.finished {
                    self.finished = true;
                    self.spy.report_timing(&self.query, self.elapsed, &self.sql);
                }
                self.spy.report_return(&ctx, row.is_some());
                Ok(row)
            }
            Err(err) => {
                if self.finished {
                    self.spy.report_exception(&ctx, &err, None, None);
                } else {
                    self.finished = true;
                    let elapsed = Some(self.elapsed);
                    self.spy.report_exception(&self.query, &err, Some(&self.sql), elapsed);
                }
                Err(err)
            }
        }
    }
}

impl Drop for SpyRows<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            self.spy.report_timing(&self.query, self.elapsed, &self.sql);
        }
    }
}
