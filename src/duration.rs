//! Overlap-free tenure arithmetic over date spans.
//!
//! Spans may overlap or repeat (duplicate export entries). Every day is
//! counted once. Open spans end at the reference date.

use chrono::NaiveDate;
use tracing::debug;

use crate::models::Timed;

const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ResolvedSpan {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }
}

fn resolve<'a, S, I>(spans: I, reference: NaiveDate) -> Vec<ResolvedSpan>
where
    S: Timed + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let mut resolved: Vec<ResolvedSpan> = spans
        .into_iter()
        .map(|span| ResolvedSpan {
            start: span.start(),
            end: span.resolved_end(reference),
        })
        .collect();
    resolved.sort_by_key(|span| span.start);
    resolved
}

/// Pushes each start past everything covered by earlier spans. The result is
/// sorted by start and pairwise disjoint; a span fully covered by earlier
/// ones collapses to zero length.
pub fn resolve_overlaps(mut spans: Vec<ResolvedSpan>) -> Vec<ResolvedSpan> {
    spans.sort_by_key(|span| span.start);
    let mut covered_until: Option<NaiveDate> = None;
    spans
        .into_iter()
        .map(|span| {
            let start = match covered_until {
                Some(covered) if span.start < covered => covered.min(span.end),
                _ => span.start,
            };
            covered_until = Some(covered_until.map_or(span.end, |c| c.max(span.end)));
            ResolvedSpan {
                start,
                end: span.end.max(start),
            }
        })
        .collect()
}

fn sum_days(sorted: Vec<ResolvedSpan>, reference: NaiveDate) -> i64 {
    match sorted.first() {
        None => 0,
        // Membership since the first entry without a break.
        Some(first) if first.end == reference => first.days(),
        Some(_) => resolve_overlaps(sorted).iter().map(ResolvedSpan::days).sum(),
    }
}

/// Days covered by `spans`, overlapping days counted once.
pub fn total_days<'a, S, I>(spans: I, reference: NaiveDate) -> i64
where
    S: Timed + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let days = sum_days(resolve(spans, reference), reference);
    debug!("    total duration without overlaps: {} days", days);
    days
}

/// Days covered by `spans` after `cutoff`. Spans ending before the cutoff are
/// ignored, spans straddling it are clipped.
pub fn total_days_since<'a, S, I>(spans: I, cutoff: NaiveDate, reference: NaiveDate) -> i64
where
    S: Timed + 'a,
    I: IntoIterator<Item = &'a S>,
{
    let clipped: Vec<ResolvedSpan> = resolve(spans, reference)
        .into_iter()
        .filter(|span| span.end >= cutoff)
        .map(|span| ResolvedSpan {
            start: span.start.max(cutoff),
            end: span.end,
        })
        .collect();
    let days = sum_days(clipped, reference);
    debug!(
        "    duration after {}: {} days",
        cutoff.format("%d.%m.%Y"),
        days
    );
    days
}

pub fn to_years(days: i64) -> f64 {
    days as f64 / DAYS_PER_YEAR
}
