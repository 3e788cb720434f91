//! # Identifier Rewrite
//!
//! Replaces the logical database and table names in a statement with a
//! shard's physical names. Only the recorded identifier spans are touched;
//! every other byte of the statement is copied through unchanged.
//!
//! ## Site Handling
//!
//! | Role           | Source text         | Replacement                 |
//! |----------------|---------------------|-----------------------------|
//! | Database       | `shop`, `` `shop` `` | shard database, same quotes |
//! | Table          | `orders`, `"orders"` | shard table, same quotes    |
//! | DatabasePrefix | (empty, before name) | `` `shard_db`. ``           |
//!
//! A name that was quoted keeps its quote character (embedded quotes are
//! doubled). An unquoted name is written bare when it is a plain identifier
//! and quoted with the mode's identifier quote otherwise.
//!
//! ## Splitting VALUES
//!
//! `apply_rows` writes a batch INSERT for one shard: the text before the
//! first tuple and after the last one is kept, and in between only the
//! selected tuples appear, joined by `", "`. Sites inside a dropped tuple
//! are dropped with it.
//!
//! ## Offset Validation
//!
//! A plan records the length of the statement and the text of every site
//! when it is built. `apply` refuses to run against text that no longer
//! matches; that is `RouteError::Unexpected` and the request fails.

use std::ops::Range;

use eyre::{bail, Result};
use tracing::error;

use crate::config::QuoteMode;
use crate::error::RouteError;
use crate::schema::ShardLocation;
use crate::sql::{IdentRole, IdentSite, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedSite {
    site: IdentSite,
    original: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    source_len: usize,
    sites: Vec<PlannedSite>,
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.bytes().all(|b| b.is_ascii_digit())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
}

fn push_identifier(out: &mut String, name: &str, quote: Option<u8>, mode: QuoteMode) {
    let quote = match quote {
        Some(q) => Some(q as char),
        None if is_plain_identifier(name) => None,
        None => Some(mode.identifier_quote() as char),
    };
    match quote {
        None => out.push_str(name),
        Some(q) => {
            out.push(q);
            for ch in name.chars() {
                if ch == q {
                    out.push(q);
                }
                out.push(ch);
            }
            out.push(q);
        }
    }
}

impl RewritePlan {
    /// Validates `sites` against `sql` and fixes their order.
    pub fn build(sql: &str, sites: impl IntoIterator<Item = IdentSite>) -> Result<Self> {
        let mut sites: Vec<IdentSite> = sites.into_iter().collect();
        sites.sort_by_key(|site| (site.span.start, site.span.len));
        sites.dedup_by_key(|site| site.span);

        let mut planned = Vec::with_capacity(sites.len());
        let mut previous: Option<Span> = None;
        for site in sites {
            let Some(original) = site.span.slice(sql) else {
                bail!(RouteError::unexpected(format!(
                    "rewrite span {}..{} is outside the statement ({} bytes)",
                    site.span.start,
                    site.span.end(),
                    sql.len()
                )));
            };
            if let Some(prev) = previous {
                if prev.overlaps(&site.span) || (prev.len > 0 && site.span.start < prev.end()) {
                    bail!(RouteError::unexpected(format!(
                        "rewrite spans {}..{} and {}..{} overlap",
                        prev.start,
                        prev.end(),
                        site.span.start,
                        site.span.end()
                    )));
                }
            }
            previous = Some(site.span);
            planned.push(PlannedSite {
                site,
                original: original.to_string(),
            });
        }

        Ok(Self {
            source_len: sql.len(),
            sites: planned,
        })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn sites(&self) -> impl Iterator<Item = &IdentSite> + '_ {
        self.sites.iter().map(|planned| &planned.site)
    }

    fn validate(&self, sql: &str) -> Result<()> {
        if sql.len() != self.source_len {
            error!(
                planned = self.source_len,
                actual = sql.len(),
                "statement changed between parse and rewrite"
            );
            bail!(RouteError::unexpected(format!(
                "statement is {} bytes, rewrite plan was built for {}",
                sql.len(),
                self.source_len
            )));
        }
        for planned in &self.sites {
            if planned.site.span.slice(sql) != Some(planned.original.as_str()) {
                error!(
                    start = planned.site.span.start,
                    expected = planned.original.as_str(),
                    "rewrite site no longer matches the statement"
                );
                bail!(RouteError::unexpected(format!(
                    "rewrite site at byte {} no longer holds {:?}",
                    planned.site.span.start, planned.original
                )));
            }
        }
        Ok(())
    }

    /// Statement text with every site pointed at `location`.
    pub fn apply(&self, sql: &str, location: &ShardLocation, mode: QuoteMode) -> Result<String> {
        self.validate(sql)?;

        let mut out = String::with_capacity(sql.len() + location.database.len() + location.table.len());
        self.render(sql, 0..sql.len(), location, mode, &mut out);
        Ok(out)
    }

    /// Like [`apply`](Self::apply), but of the `VALUES` tuples in `rows`
    /// only those listed in `keep` survive, joined by `", "`.
    ///
    /// `rows` must be in source order and `keep` must hold ascending,
    /// distinct indexes into it.
    pub fn apply_rows(
        &self,
        sql: &str,
        location: &ShardLocation,
        mode: QuoteMode,
        rows: &[Span],
        keep: &[usize],
    ) -> Result<String> {
        self.validate(sql)?;
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return self.apply(sql, location, mode);
        };
        for pair in rows.windows(2) {
            if pair[1].start < pair[0].end() {
                bail!(RouteError::unexpected(format!(
                    "value rows at bytes {} and {} are out of order",
                    pair[0].start, pair[1].start
                )));
            }
        }
        if last.end() > sql.len() {
            bail!(RouteError::unexpected(format!(
                "value row {}..{} is outside the statement ({} bytes)",
                last.start,
                last.end(),
                sql.len()
            )));
        }
        if keep.is_empty() || keep.windows(2).any(|pair| pair[0] >= pair[1]) {
            bail!(RouteError::unexpected("kept value rows must be ascending and non-empty"));
        }

        let mut out = String::with_capacity(sql.len() + location.database.len() + location.table.len());
        self.render(sql, 0..first.start, location, mode, &mut out);
        for (n, &index) in keep.iter().enumerate() {
            let Some(row) = rows.get(index) else {
                bail!(RouteError::unexpected(format!(
                    "value row {} of {} does not exist",
                    index,
                    rows.len()
                )));
            };
            if n > 0 {
                out.push_str(", ");
            }
            self.render(sql, row.start..row.end(), location, mode, &mut out);
        }
        self.render(sql, last.end()..sql.len(), location, mode, &mut out);
        Ok(out)
    }

    /// Copies `sql[range]`, replacing the sites that fall inside it.
    fn render(
        &self,
        sql: &str,
        range: Range<usize>,
        location: &ShardLocation,
        mode: QuoteMode,
        out: &mut String,
    ) {
        let mut copied = range.start;
        for planned in &self.sites {
            let span = planned.site.span;
            let inside = span.start >= range.start
                && span.end() <= range.end
                && (span.len > 0 || span.start < range.end);
            if !inside {
                continue;
            }
            out.push_str(&sql[copied..span.start]);
            match planned.site.role {
                IdentRole::Database => push_identifier(out, &location.database, planned.site.quote, mode),
                IdentRole::Table => push_identifier(out, &location.table, planned.site.quote, mode),
                IdentRole::DatabasePrefix => {
                    let quote = planned.site.quote.or(Some(mode.identifier_quote()));
                    push_identifier(out, &location.database, quote, mode);
                    out.push('.');
                }
            }
            copied = span.end();
        }
        out.push_str(&sql[copied..range.end]);
    }
}
