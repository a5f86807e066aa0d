use std::collections::{BTreeMap, HashMap};

use time::Date;
use tracing::{info, warn};

use super::repo::{AvailabilityRow, AvailabilityStore};
use crate::{
    calendar::{self, TimeSlot},
    error::AppResult,
};

/// Whether the bakery takes orders on a day, and for which pickup slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayAvailability {
    Open(Vec<TimeSlot>),
    Closed,
}

impl DayAvailability {
    pub fn is_open(&self) -> bool {
        matches!(self, DayAvailability::Open(_))
    }

    pub fn offers(&self, slot: TimeSlot) -> bool {
        match self {
            DayAvailability::Open(slots) => slots.contains(&slot),
            DayAvailability::Closed => false,
        }
    }

    fn from_stored(date: Date, stored: &[String]) -> Self {
        let mut slots: Vec<TimeSlot> = stored
            .iter()
            .filter_map(|raw| match raw.parse::<TimeSlot>() {
                Ok(slot) => Some(slot),
                Err(_) => {
                    warn!(%date, slot = %raw, "skipping malformed stored time slot");
                    None
                }
            })
            .collect();
        slots.sort();
        slots.dedup();
        if slots.is_empty() {
            DayAvailability::Closed
        } else {
            DayAvailability::Open(slots)
        }
    }
}

/// Lays stored rows over every day of the range; days without a row are closed.
fn merge_range(days: Vec<Date>, rows: Vec<AvailabilityRow>) -> BTreeMap<Date, DayAvailability> {
    let by_date: HashMap<Date, Vec<String>> =
        rows.into_iter().map(|r| (r.date, r.time_slots)).collect();
    days.into_iter()
        .map(|day| {
            let availability = by_date
                .get(&day)
                .map(|slots| DayAvailability::from_stored(day, slots))
                .unwrap_or(DayAvailability::Closed);
            (day, availability)
        })
        .collect()
}

pub async fn get_availability<S>(store: &S, date: Date) -> AppResult<DayAvailability>
where
    S: AvailabilityStore + ?Sized,
{
    let row = store.find_by_date(date).await?;
    Ok(row
        .map(|r| DayAvailability::from_stored(date, &r.time_slots))
        .unwrap_or(DayAvailability::Closed))
}

pub async fn get_availability_range<S>(
    store: &S,
    start: Date,
    end: Date,
) -> AppResult<BTreeMap<Date, DayAvailability>>
where
    S: AvailabilityStore + ?Sized,
{
    let days = calendar::days_in_range(start, end)?;
    let rows = store.list_between(start, end).await?;
    Ok(merge_range(days, rows))
}

/// Replaces a day's slots; an empty list closes the day.
pub async fn set_availability<S, T>(
    store: &S,
    date: Date,
    raw_slots: &[T],
) -> AppResult<DayAvailability>
where
    S: AvailabilityStore + ?Sized,
    T: AsRef<str> + Sync,
{
    let slots = calendar::normalize_slots(raw_slots)?;
    if slots.is_empty() {
        let removed = store.delete(date).await?;
        info!(%date, removed, "availability cleared");
        return Ok(DayAvailability::Closed);
    }
    let stored: Vec<String> = slots.iter().map(|s| s.to_string()).collect();
    store.upsert(date, &stored).await?;
    info!(%date, slots = stored.len(), "availability set");
    Ok(DayAvailability::Open(slots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::date;

    #[derive(Default)]
    struct MemoryStore {
        days: Mutex<BTreeMap<Date, Vec<String>>>,
    }

    #[async_trait]
    impl AvailabilityStore for MemoryStore {
        async fn find_by_date(&self, date: Date) -> anyhow::Result<Option<AvailabilityRow>> {
            Ok(self.days.lock().unwrap().get(&date).map(|slots| AvailabilityRow {
                date,
                time_slots: slots.clone(),
            }))
        }

        async fn list_between(&self, start: Date, end: Date) -> anyhow::Result<Vec<AvailabilityRow>> {
            Ok(self
                .days
                .lock()
                .unwrap()
                .range(start..=end)
                .map(|(date, slots)| AvailabilityRow {
                    date: *date,
                    time_slots: slots.clone(),
                })
                .collect())
        }

        async fn upsert(&self, date: Date, slots: &[String]) -> anyhow::Result<()> {
            self.days.lock().unwrap().insert(date, slots.to_vec());
            Ok(())
        }

        async fn delete(&self, date: Date) -> anyhow::Result<bool> {
            Ok(self.days.lock().unwrap().remove(&date).is_some())
        }
    }

    fn slot(s: &str) -> TimeSlot {
        s.parse().unwrap()
    }

    #[test]
    fn empty_or_garbage_rows_are_closed() {
        assert_eq!(DayAvailability::from_stored(date!(2026 - 10 - 17), &[]), DayAvailability::Closed);
        assert_eq!(
            DayAvailability::from_stored(date!(2026 - 10 - 17), &["bad".into()]),
            DayAvailability::Closed
        );
    }

    #[test]
    fn stored_slots_keep_exact_order() {
        let day = DayAvailability::from_stored(
            date!(2026 - 10 - 17),
            &["10:00".into(), "10:30".into()],
        );
        assert_eq!(day, DayAvailability::Open(vec![slot("10:00"), slot("10:30")]));
        assert!(day.offers(slot("10:30")));
        assert!(!day.offers(slot("11:00")));
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::default();
        let day = date!(2026 - 10 - 20);
        set_availability(&store, day, &["10:00", "10:30"]).await.unwrap();
        assert_eq!(
            get_availability(&store, day).await.unwrap(),
            DayAvailability::Open(vec![slot("10:00"), slot("10:30")])
        );

        set_availability::<_, &str>(&store, day, &[]).await.unwrap();
        assert_eq!(get_availability(&store, day).await.unwrap(), DayAvailability::Closed);
        assert!(store.days.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_sorts_and_dedups_slots() {
        let store = MemoryStore::default();
        let day = date!(2026 - 10 - 21);
        set_availability(&store, day, &["11:00", "09:30", "11:00"]).await.unwrap();
        assert_eq!(store.days.lock().unwrap()[&day], vec!["09:30", "11:00"]);
        assert!(set_availability(&store, day, &["9:15"]).await.is_err());
    }

    #[tokio::test]
    async fn range_only_opens_stored_days() {
        let store = MemoryStore::default();
        set_availability(&store, date!(2026 - 10 - 18), &["09:00"]).await.unwrap();
        set_availability(&store, date!(2026 - 10 - 25), &["09:00"]).await.unwrap();
        let range = get_availability_range(&store, date!(2026 - 10 - 17), date!(2026 - 10 - 19))
            .await
            .unwrap();
        let open: Vec<_> = range.iter().filter(|(_, d)| d.is_open()).map(|(d, _)| *d).collect();
        assert_eq!(open, vec![date!(2026 - 10 - 18)]);
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn range_fills_missing_days_as_closed() {
        let days = calendar::days_in_range(date!(2026 - 10 - 17), date!(2026 - 10 - 19)).unwrap();
        let rows = vec![AvailabilityRow {
            date: date!(2026 - 10 - 18),
            time_slots: vec!["09:00".into()],
        }];
        let merged = merge_range(days, rows);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[&date!(2026 - 10 - 17)], DayAvailability::Closed);
        assert_eq!(merged[&date!(2026 - 10 - 18)], DayAvailability::Open(vec![slot("09:00")]));
        assert_eq!(merged[&date!(2026 - 10 - 19)], DayAvailability::Closed);
    }
}
