// libs/agenda-cell/src/services/hours.rs
//
// Resolves the effective business hours for a clinic or a specific
// professional, with a read-through cache in front of the config store.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{DayHours, TimePoint, WeekHours, DEFAULT_SLOT_MINUTES, MINUTES_PER_DAY};
use crate::services::clock;

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

const DAY_KEYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

struct CacheEntry {
    hours: WeekHours,
    fetched_at: Instant,
}

/// Process-wide cache of resolved week hours, keyed by
/// `"{clinic}:{professional|clinic}"`. Entries expire after five minutes
/// and are dropped explicitly when hours are edited. Misses always
/// re-query; failures are never cached.
pub struct HoursCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl HoursCache {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn get(&self, key: &str) -> Option<WeekHours> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.hours.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: String, hours: WeekHours) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                hours,
                fetched_at: Instant::now(),
            },
        );
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

impl Default for HoursCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ProfessionalHoursRow {
    weekday: u8,
    opens_at: Option<String>,
    closes_at: Option<String>,
    break_start: Option<String>,
    break_end: Option<String>,
    slot_minutes: Option<u16>,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct ClinicSettingRow {
    key: String,
    value: String,
}

pub struct HoursService {
    supabase: Arc<SupabaseClient>,
    cache: Arc<HoursCache>,
}

impl HoursService {
    pub fn new(config: &AppConfig, cache: Arc<HoursCache>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            cache,
        }
    }

    /// Resolve the week hours effective for a clinic, or for one of its
    /// professionals when `professional_id` is given. Never fails: when
    /// the config store is unreachable the result is an empty week and
    /// every day is treated as closed.
    pub async fn resolve(
        &self,
        clinic_id: Uuid,
        professional_id: Option<Uuid>,
        auth_token: &str,
    ) -> WeekHours {
        let key = cache_key(clinic_id, professional_id);

        if let Some(hit) = self.cache.get(&key) {
            debug!("Hours cache hit for {}", key);
            return hit;
        }

        match self.fetch(clinic_id, professional_id, auth_token).await {
            Ok(hours) => {
                self.cache.put(key, hours.clone());
                hours
            }
            Err(e) => {
                warn!(
                    "Hours lookup failed for {}, treating every weekday as closed: {}",
                    key, e
                );
                WeekHours::default()
            }
        }
    }

    /// Drop cached hours after a hours edit. A professional-hours edit
    /// must not leave a stale clinic-level fallback visible, so the
    /// clinic entry is always dropped as well.
    pub fn invalidate(&self, clinic_id: Uuid, professional_id: Option<Uuid>) {
        if professional_id.is_some() {
            self.cache.remove(&cache_key(clinic_id, professional_id));
        }
        self.cache.remove(&cache_key(clinic_id, None));
        debug!("Invalidated hours cache for clinic {}", clinic_id);
    }

    async fn fetch(
        &self,
        clinic_id: Uuid,
        professional_id: Option<Uuid>,
        auth_token: &str,
    ) -> anyhow::Result<WeekHours> {
        if let Some(professional_id) = professional_id {
            let path = format!(
                "/rest/v1/professional_hours?clinic_id=eq.{}&professional_id=eq.{}&order=weekday.asc",
                clinic_id, professional_id
            );
            let rows: Vec<Value> = self
                .supabase
                .request(Method::GET, &path, Some(auth_token), None)
                .await?;

            if !rows.is_empty() {
                let rows: Vec<ProfessionalHoursRow> = rows
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<Result<_, _>>()?;
                return Ok(build_from_professional_rows(rows));
            }
        }

        let path = format!(
            "/rest/v1/clinic_settings?clinic_id=eq.{}&select=key,value",
            clinic_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        let rows: Vec<ClinicSettingRow> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()?;

        Ok(build_from_clinic_settings(rows))
    }
}

fn cache_key(clinic_id: Uuid, professional_id: Option<Uuid>) -> String {
    match professional_id {
        Some(professional_id) => format!("{}:{}", clinic_id, professional_id),
        None => format!("{}:clinic", clinic_id),
    }
}

/// Build week hours from a professional's weekly rows. Only active rows
/// contribute; an inactive row leaves its weekday closed.
/// When rows disagree on the slot duration the first active row wins.
fn build_from_professional_rows(rows: Vec<ProfessionalHoursRow>) -> WeekHours {
    let mut week = WeekHours::default();
    let mut slot_minutes: Option<u16> = None;

    for row in rows.iter().filter(|r| r.is_active) {
        let weekday = row.weekday as usize;
        if weekday > 6 {
            error!("Professional hours row has weekday {} out of range", row.weekday);
            continue;
        }

        week.days[weekday] = build_day(
            parse_time(row.opens_at.as_deref()),
            parse_time(row.closes_at.as_deref()),
            parse_time(row.break_start.as_deref()),
            parse_time(row.break_end.as_deref()),
        );

        if let Some(row_slot) = row.slot_minutes.filter(|m| plausible_slot_duration(*m)) {
            match slot_minutes {
                None => slot_minutes = Some(row_slot),
                Some(kept) if kept != row_slot => {
                    warn!(
                        "Professional hours rows disagree on slot duration ({} vs {}), keeping {}",
                        kept, row_slot, kept
                    );
                }
                Some(_) => {}
            }
        }
    }

    let slot_minutes = slot_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
    for day in &mut week.days {
        day.slot_minutes = slot_minutes;
    }

    week
}

/// Build week hours from the clinic-level key/value settings. Only the
/// known key set is read; missing keys leave the field absent.
fn build_from_clinic_settings(rows: Vec<ClinicSettingRow>) -> WeekHours {
    let settings: HashMap<String, String> = rows.into_iter().map(|r| (r.key, r.value)).collect();

    let break_start = parse_time(settings.get("break_start").map(String::as_str));
    let break_end = parse_time(settings.get("break_end").map(String::as_str));
    let slot_minutes = settings
        .get("slot_minutes")
        .and_then(|v| v.parse::<u16>().ok())
        .filter(|m| plausible_slot_duration(*m))
        .unwrap_or(DEFAULT_SLOT_MINUTES);

    let mut week = WeekHours::default();
    for (weekday, day_key) in DAY_KEYS.iter().enumerate() {
        let opens_at = parse_time(settings.get(&format!("hours_{}_open", day_key)).map(String::as_str));
        let closes_at = parse_time(settings.get(&format!("hours_{}_close", day_key)).map(String::as_str));

        week.days[weekday] = build_day(opens_at, closes_at, break_start, break_end);
        week.days[weekday].slot_minutes = slot_minutes;
    }

    week
}

/// Assemble one day, enforcing the hours invariants: open before close,
/// break fully inside the open window and only applied when both bounds
/// are present.
fn build_day(
    opens_at: Option<TimePoint>,
    closes_at: Option<TimePoint>,
    break_start: Option<TimePoint>,
    break_end: Option<TimePoint>,
) -> DayHours {
    let mut day = DayHours::default();

    let (opens_at, closes_at) = match (opens_at, closes_at) {
        (Some(o), Some(c)) if o < c => (o, c),
        (Some(o), Some(c)) => {
            error!(
                "Ignoring hours with open {} not before close {}",
                clock::format_minutes(o),
                clock::format_minutes(c)
            );
            return day;
        }
        _ => return day,
    };

    day.opens_at = Some(opens_at);
    day.closes_at = Some(closes_at);

    if let (Some(bs), Some(be)) = (break_start, break_end) {
        if bs < be && bs >= opens_at && be <= closes_at {
            day.break_start = Some(bs);
            day.break_end = Some(be);
        } else {
            warn!(
                "Ignoring break {}-{} outside open window {}-{}",
                clock::format_minutes(bs),
                clock::format_minutes(be),
                clock::format_minutes(opens_at),
                clock::format_minutes(closes_at)
            );
        }
    }

    day
}

// A slot duration must fit inside one day; anything else is a
// misconfigured row and falls back to the default.
fn plausible_slot_duration(minutes: u16) -> bool {
    minutes > 0 && minutes < MINUTES_PER_DAY
}

fn parse_time(value: Option<&str>) -> Option<TimePoint> {
    let value = value?;
    match clock::to_minutes(value) {
        Ok(t) => Some(t),
        Err(_) => {
            error!("Malformed time {:?} in hours configuration, ignoring", value);
            None
        }
    }
}
