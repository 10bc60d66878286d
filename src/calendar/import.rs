//! # External Calendar Import Adapter
//!
//! Fetches a remote iCalendar feed with a bounded timeout and parses it into
//! normalized busy periods for the sync horizon. All-day entries become
//! whole-day UTC windows; recurring entries are expanded through their RRULE
//! into concrete occurrences within the horizon.
//!
//! Fetch and parse failures return typed errors and mutate nothing; failure
//! bookkeeping belongs to the reconciliation job.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::ExternalBusyPeriod;
use crate::config::SyncConfig;
use crate::constants::system;
use crate::error::{BookingError, Result};
use crate::models::TimeRange;

/// Fetch seam for the reconciliation job; mocked in tests.
#[async_trait]
pub trait BusyPeriodFetcher: Send + Sync {
    /// Fetch and normalize the feed at `feed_url`, keeping only periods that
    /// intersect `horizon`.
    async fn fetch_busy_periods(
        &self,
        feed_url: &str,
        horizon: &TimeRange,
    ) -> Result<Vec<ExternalBusyPeriod>>;
}

/// HTTP implementation over reqwest with the configured timeout and
/// User-Agent.
#[derive(Debug, Clone)]
pub struct IcsFeedClient {
    http: reqwest::Client,
}

impl IcsFeedClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BookingError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl BusyPeriodFetcher for IcsFeedClient {
    async fn fetch_busy_periods(
        &self,
        feed_url: &str,
        horizon: &TimeRange,
    ) -> Result<Vec<ExternalBusyPeriod>> {
        let response = self
            .http
            .get(feed_url)
            .send()
            .await
            .map_err(|e| BookingError::ExternalFetch(format!("GET {feed_url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingError::ExternalFetch(format!(
                "GET {feed_url}: unexpected status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BookingError::ExternalFetch(format!("reading body of {feed_url}: {e}")))?;

        let periods = parse_ics_feed(&body, horizon)?;
        debug!(
            feed_url,
            periods = periods.len(),
            "Fetched external busy periods"
        );
        Ok(periods)
    }
}

/// Parse an iCalendar document into busy periods intersecting `horizon`.
pub fn parse_ics_feed(document: &str, horizon: &TimeRange) -> Result<Vec<ExternalBusyPeriod>> {
    if !document.contains("BEGIN:VCALENDAR") {
        return Err(BookingError::ExternalParse(
            "payload is not an iCalendar document".to_string(),
        ));
    }

    let lines = unfold_lines(document);
    let mut periods = Vec::new();

    for event in extract_vevents(&lines) {
        match expand_event(&event, horizon) {
            Ok(mut expanded) => {
                periods.append(&mut expanded);
                if periods.len() > system::MAX_FEED_EVENTS {
                    return Err(BookingError::ExternalParse(format!(
                        "feed expands to more than {} events",
                        system::MAX_FEED_EVENTS
                    )));
                }
            }
            // One malformed VEVENT does not poison the whole feed
            Err(err) => warn!(error = %err, uid = event.get("UID").map(|p| p.value.as_str()), "Skipping unparseable VEVENT"),
        }
    }

    Ok(periods)
}

/// One property line: parameters (e.g. `TZID=...`, `VALUE=DATE`) and value.
#[derive(Debug, Clone)]
struct Property {
    params: Vec<String>,
    value: String,
}

type VEvent = HashMap<String, Property>;

/// RFC 5545 §3.1 line unfolding: a line starting with space/tab continues
/// the previous line.
fn unfold_lines(document: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in document.lines() {
        let raw = raw.trim_end_matches('\r');
        if let Some(continuation) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(continuation);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

/// Collect the properties of each VEVENT block. Later duplicates of a
/// property within one event are ignored (first wins).
fn extract_vevents(lines: &[String]) -> Vec<VEvent> {
    let mut events = Vec::new();
    let mut current: Option<VEvent> = None;

    for line in lines {
        if line == "BEGIN:VEVENT" {
            current = Some(HashMap::new());
            continue;
        }
        if line == "END:VEVENT" {
            if let Some(event) = current.take() {
                events.push(event);
            }
            continue;
        }
        let Some(event) = current.as_mut() else {
            continue;
        };
        let Some((name_part, value)) = line.split_once(':') else {
            continue;
        };
        let mut name_segments = name_part.split(';');
        let name = name_segments.next().unwrap_or_default().to_uppercase();
        let params: Vec<String> = name_segments.map(str::to_string).collect();
        event.entry(name).or_insert(Property {
            params,
            value: value.to_string(),
        });
    }

    events
}

/// Expand one VEVENT into concrete busy periods within the horizon.
fn expand_event(event: &VEvent, horizon: &TimeRange) -> Result<Vec<ExternalBusyPeriod>> {
    let dtstart = event
        .get("DTSTART")
        .ok_or_else(|| BookingError::ExternalParse("VEVENT without DTSTART".to_string()))?;

    let all_day = dtstart.params.iter().any(|p| p == "VALUE=DATE");
    let start = parse_ics_datetime(dtstart)?;
    let end = match event.get("DTEND") {
        Some(dtend) => parse_ics_datetime(dtend)?,
        // RFC 5545: a DATE event without DTEND lasts one day; zero-length
        // timed events carry no busy time and are dropped below
        None if all_day => start + Duration::days(1),
        None => start,
    };
    if start >= end {
        return Ok(Vec::new());
    }
    let duration = end - start;

    let uid = event.get("UID").map(|p| p.value.clone());
    let summary = event.get("SUMMARY").map(|p| p.value.clone());

    let occurrence_starts = match event.get("RRULE") {
        Some(rule) => expand_rrule(start, &rule.value, horizon)?,
        None => vec![start],
    };

    Ok(occurrence_starts
        .into_iter()
        .filter_map(|occurrence_start| {
            let range = TimeRange::new(occurrence_start, occurrence_start + duration).ok()?;
            range.overlaps(horizon).then(|| ExternalBusyPeriod {
                uid: uid.clone(),
                summary: summary.clone(),
                range,
            })
        })
        .collect())
}

/// Expand an RRULE into occurrence starts within the horizon, bounded by
/// [`system::MAX_RECURRENCE_EXPANSIONS`].
fn expand_rrule(
    start: DateTime<Utc>,
    rule: &str,
    horizon: &TimeRange,
) -> Result<Vec<DateTime<Utc>>> {
    let source = format!(
        "DTSTART:{}\nRRULE:{}",
        start.format("%Y%m%dT%H%M%SZ"),
        rule
    );
    let set: RRuleSet = source
        .parse()
        .map_err(|e| BookingError::ExternalParse(format!("invalid RRULE '{rule}': {e}")))?;

    let result = set
        .after(horizon.start().with_timezone(&rrule::Tz::UTC))
        .before(horizon.end().with_timezone(&rrule::Tz::UTC))
        .all(system::MAX_RECURRENCE_EXPANSIONS);

    if result.limited {
        warn!(rule, "RRULE expansion truncated at the occurrence cap");
    }

    Ok(result
        .dates
        .into_iter()
        .map(|occurrence| occurrence.with_timezone(&Utc))
        .collect())
}

/// Parse the three DTSTART/DTEND shapes: UTC (`...Z`), TZID-qualified local,
/// and bare date / floating local (treated as UTC).
fn parse_ics_datetime(property: &Property) -> Result<DateTime<Utc>> {
    let value = property.value.trim();

    if let Some(tzid) = property
        .params
        .iter()
        .find_map(|p| p.strip_prefix("TZID="))
    {
        let tz: Tz = tzid
            .parse()
            .map_err(|_| BookingError::ExternalParse(format!("unknown TZID '{tzid}'")))?;
        let naive = parse_naive(value)?;
        return tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| {
                BookingError::ExternalParse(format!("nonexistent local time '{value}' in {tzid}"))
            });
    }

    if let Some(utc_value) = value.strip_suffix('Z') {
        let naive = parse_naive(utc_value)?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    // Floating time or bare date: interpreted as UTC for busy-period purposes
    let naive = parse_naive(value)?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn parse_naive(value: &str) -> Result<NaiveDateTime> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Ok(datetime);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        return Ok(date.and_hms_opt(0, 0, 0).expect("midnight is always valid"));
    }
    Err(BookingError::ExternalParse(format!(
        "unrecognized date-time '{value}'"
    )))
}
