//! Analytical queries over resolved, non-blacklisted segments.
//!
//! Totals see segments through the `visible` view: raw identities resolved to their display
//! names, minus rows whose raw or display name is an exact blacklist entry. First-seen dates
//! look at every segment of a display group. Date bounds are inclusive and compared against
//! the stored calendar date.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use pt_core::{
    BucketScheme, DATE_FORMAT, DateRange, Granularity, Period, TimelineInterval,
    TimelineSegment, TimelineZone, clip_to_day, parse_date,
};
use rusqlite::params;
use serde::Serialize;

use crate::{Database, DbError};

const VISIBLE_SEGMENTS: &str = "
    visible AS (
        SELECT COALESCE(m.display_name, s.raw_identity) AS name,
               s.calendar_date AS day,
               s.start_time AS start_time,
               s.end_time AS end_time,
               s.duration AS duration
        FROM segments s
        LEFT JOIN display_mapping m ON m.raw_identity = s.raw_identity
        WHERE NOT EXISTS (
            SELECT 1 FROM filter_entries bx
            WHERE bx.kind = 'blacklist'
              AND (bx.name = s.raw_identity OR bx.name = COALESCE(m.display_name, s.raw_identity))
        )
    )";

// Effective first-seen date: the override when present, else the earliest day of any
// segment in the group. Raw-level blacklist entries do not move it; only a blacklisted
// display name drops the identity.
const FIRST_SEEN: &str = "
    first_seen AS (
        SELECT e.name AS name, COALESCE(o.first_date, e.first_day) AS first_date
        FROM (
            SELECT COALESCE(fm.display_name, fs.raw_identity) AS name,
                   MIN(fs.calendar_date) AS first_day
            FROM segments fs
            LEFT JOIN display_mapping fm ON fm.raw_identity = fs.raw_identity
            GROUP BY COALESCE(fm.display_name, fs.raw_identity)
        ) e
        LEFT JOIN first_launch_overrides o ON o.display_name = e.name
        WHERE NOT EXISTS (
            SELECT 1 FROM filter_entries bx
            WHERE bx.kind = 'blacklist' AND bx.name = e.name
        )
    )";

/// Total time for one display identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryItem {
    pub name: String,
    pub seconds: f64,
}

/// Bucketed totals: `matrix[i][j]` is the time of `identities[i]` in bucket `labels[j]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMatrix {
    pub scheme: BucketScheme,
    pub labels: Vec<String>,
    pub identities: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

/// One day of the activity calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    pub date: String,
    pub seconds: f64,
    /// Display identities first seen on this day.
    pub new: Vec<String>,
    /// Display identities marked finished on this day.
    pub finished: Vec<String>,
}

/// Flags for an identity played within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameMeta {
    pub name: String,
    pub is_new: bool,
    pub finished_in_period: bool,
}

/// Activity of one day laid out as second offsets from local midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTimeline {
    pub date: String,
    pub zone: String,
    pub segments: Vec<TimelineSegment>,
}

/// A display identity seen in the ledger, blacklisted or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownIdentity {
    pub name: String,
    /// One raw identity behind the name (the smallest).
    pub original: String,
    pub sessions: i64,
    pub whitelisted: bool,
    pub blacklisted: bool,
}

impl Database {
    /// Total time per display identity over the range, largest first.
    pub fn summary(&self, range: &DateRange) -> Result<Vec<SummaryItem>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            WITH {VISIBLE_SEGMENTS}
            SELECT name, SUM(duration) AS seconds
            FROM visible
            WHERE day >= ?1 AND day <= ?2
            GROUP BY name
            ORDER BY seconds DESC, name ASC
            "
        ))?;
        let rows = stmt.query_map(params![range.start_str(), range.end_str()], |row| {
            Ok(SummaryItem {
                name: row.get(0)?,
                seconds: row.get(1)?,
            })
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Bucketed totals per display identity.
    ///
    /// Every bucket label of the range is present even without data. Identities are ordered
    /// by descending grand total, then by name.
    pub fn series(
        &self,
        period: Period,
        range: &DateRange,
        granularity: Granularity,
    ) -> Result<SeriesMatrix, DbError> {
        let scheme = BucketScheme::for_query(period, granularity);
        let labels = scheme.labels(range);
        let positions: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(index, label)| (label.as_str(), index))
            .collect();

        let mut stmt = self.conn.prepare(&format!(
            "
            WITH {VISIBLE_SEGMENTS}
            SELECT day, name, SUM(duration)
            FROM visible
            WHERE day >= ?1 AND day <= ?2
            GROUP BY day, name
            "
        ))?;
        let rows = stmt.query_map(params![range.start_str(), range.end_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let mut totals: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in rows {
            let (day, name, seconds) = row?;
            let Ok(day) = parse_date("calendar date", &day) else {
                tracing::warn!(%day, %name, "skipping segment with malformed calendar date");
                continue;
            };
            let Some(&index) = positions.get(scheme.key(day).as_str()) else {
                continue;
            };
            totals
                .entry(name)
                .or_insert_with(|| vec![0.0; labels.len()])[index] += seconds;
        }

        let mut ranked: Vec<(String, Vec<f64>, f64)> = totals
            .into_iter()
            .map(|(name, row)| {
                let total = row.iter().sum();
                (name, row, total)
            })
            .collect();
        ranked.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

        let (identities, matrix) = ranked.into_iter().map(|(name, row, _)| (name, row)).unzip();
        Ok(SeriesMatrix {
            scheme,
            labels,
            identities,
            matrix,
        })
    }

    /// One entry per day of the range with totals, new identities and finished markers.
    pub fn calendar_days(&self, range: &DateRange) -> Result<Vec<CalendarDay>, DbError> {
        let mut days: BTreeMap<String, CalendarDay> = range
            .days()
            .map(|day| {
                let date = day.format(DATE_FORMAT).to_string();
                (
                    date.clone(),
                    CalendarDay {
                        date,
                        seconds: 0.0,
                        new: Vec::new(),
                        finished: Vec::new(),
                    },
                )
            })
            .collect();
        let (start, end) = (range.start_str(), range.end_str());

        let mut stmt = self.conn.prepare(&format!(
            "
            WITH {VISIBLE_SEGMENTS}
            SELECT day, SUM(duration)
            FROM visible
            WHERE day >= ?1 AND day <= ?2
            GROUP BY day
            "
        ))?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (day, seconds) = row?;
            if let Some(entry) = days.get_mut(&day) {
                entry.seconds = seconds;
            }
        }

        let mut stmt = self.conn.prepare(&format!(
            "
            WITH {FIRST_SEEN}
            SELECT first_date, name
            FROM first_seen
            WHERE first_date >= ?1 AND first_date <= ?2
            ORDER BY first_date ASC, name COLLATE NOCASE ASC
            "
        ))?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (day, name) = row?;
            if let Some(entry) = days.get_mut(&day) {
                entry.new.push(name);
            }
        }

        let mut stmt = self.conn.prepare(
            "
            SELECT fm.finished_at, fm.display_name
            FROM finished_markers fm
            WHERE fm.finished_at >= ?1 AND fm.finished_at <= ?2
              AND NOT EXISTS (
                SELECT 1 FROM filter_entries bx
                WHERE bx.kind = 'blacklist' AND bx.name = fm.display_name
              )
            ORDER BY fm.finished_at ASC, fm.display_name COLLATE NOCASE ASC
            ",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (day, name) = row?;
            if let Some(entry) = days.get_mut(&day) {
                entry.finished.push(name);
            }
        }

        Ok(days.into_values().collect())
    }

    /// Identities with any visible activity in the range, with new/finished flags.
    pub fn games_meta(&self, range: &DateRange) -> Result<Vec<GameMeta>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            WITH {VISIBLE_SEGMENTS}, {FIRST_SEEN},
            in_range AS (
                SELECT DISTINCT name FROM visible WHERE day >= ?1 AND day <= ?2
            )
            SELECT r.name,
                   CASE WHEN fs.first_date >= ?1 AND fs.first_date <= ?2 THEN 1 ELSE 0 END,
                   CASE WHEN fm.finished_at >= ?1 AND fm.finished_at <= ?2 THEN 1 ELSE 0 END
            FROM in_range r
            LEFT JOIN first_seen fs ON fs.name = r.name
            LEFT JOIN finished_markers fm ON fm.display_name = r.name
            ORDER BY r.name COLLATE NOCASE ASC
            "
        ))?;
        let rows = stmt.query_map(params![range.start_str(), range.end_str()], |row| {
            Ok(GameMeta {
                name: row.get(0)?,
                is_new: row.get(1)?,
                finished_in_period: row.get(2)?,
            })
        })?;
        let mut games = Vec::new();
        for row in rows {
            games.push(row?);
        }
        Ok(games)
    }

    /// Segments stored for `date`, clipped to that day in `zone`.
    pub fn day_timeline(&self, date: NaiveDate, zone: TimelineZone) -> Result<DayTimeline, DbError> {
        let day = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(&format!(
            "
            WITH {VISIBLE_SEGMENTS}
            SELECT name, start_time, end_time
            FROM visible
            WHERE day = ?1
            ORDER BY start_time ASC
            "
        ))?;
        let rows = stmt.query_map([&day], |row| {
            Ok(TimelineInterval {
                name: row.get(0)?,
                start_time: row.get(1)?,
                end_time: row.get(2)?,
            })
        })?;
        let mut intervals = Vec::new();
        for row in rows {
            intervals.push(row?);
        }
        Ok(DayTimeline {
            date: day,
            zone: zone.to_string(),
            segments: clip_to_day(&intervals, date, zone),
        })
    }

    /// Every display identity in the ledger with filter flags, ordered case-insensitively.
    pub fn known_identities(&self) -> Result<Vec<KnownIdentity>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT COALESCE(m.display_name, s.raw_identity) AS name,
                   MIN(s.raw_identity),
                   COUNT(*),
                   MAX(EXISTS (
                       SELECT 1 FROM filter_entries w
                       WHERE w.kind = 'whitelist'
                         AND (w.name = s.raw_identity OR w.name = COALESCE(m.display_name, s.raw_identity))
                   )),
                   MAX(EXISTS (
                       SELECT 1 FROM filter_entries b
                       WHERE b.kind = 'blacklist'
                         AND (b.name = s.raw_identity OR b.name = COALESCE(m.display_name, s.raw_identity))
                   ))
            FROM segments s
            LEFT JOIN display_mapping m ON m.raw_identity = s.raw_identity
            GROUP BY COALESCE(m.display_name, s.raw_identity)
            ORDER BY name COLLATE NOCASE ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(KnownIdentity {
                name: row.get(0)?,
                original: row.get(1)?,
                sessions: row.get(2)?,
                whitelisted: row.get(3)?,
                blacklisted: row.get(4)?,
            })
        })?;
        let mut known = Vec::new();
        for row in rows {
            known.push(row?);
        }
        Ok(known)
    }
}
