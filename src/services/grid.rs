//! Weekly timetable grid: a fixed 7 day × 4 slot structure for display.

use crate::error::SchoolError;
use crate::models::school::{MAX_DAY, MAX_SLOT, MIN_DAY, MIN_SLOT, WeekType};
use chrono::{Datelike, Days, NaiveDate, TimeDelta};
use log::warn;
use serde::Serialize;

pub const DAY_NAMES: [&str; 7] = [
    "Понедельник",
    "Вторник",
    "Среда",
    "Четверг",
    "Пятница",
    "Суббота",
    "Воскресенье",
];

pub const DAY_ABBREVIATIONS: [&str; 7] = ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"];

/// Canonical start/end of each daily slot.
pub const SLOT_TIMES: [(&str, &str); 4] = [
    ("08:30", "10:00"),
    ("10:10", "11:40"),
    ("12:20", "13:50"),
    ("14:00", "15:30"),
];

pub fn slot_label(slot: i32) -> Option<String> {
    let index = usize::try_from(slot - MIN_SLOT).ok()?;
    SLOT_TIMES.get(index).map(|(start, end)| format!("{}–{}", start, end))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstituteNote {
    pub substitution_id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub date: NaiveDate,
    pub reason: Option<String>,
    pub is_confirmed: bool,
}

/// One schedule row with the names needed to render it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub schedule_id: i64,
    pub day_of_week: i32,
    pub slot_number: i32,
    pub week_type: String,
    pub group_id: i64,
    pub group_name: String,
    pub course_id: i64,
    pub course_name: String,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub room_id: i64,
    pub room_number: String,
    pub substitute: Option<SubstituteNote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotCell {
    pub slot: i32,
    pub time: String,
    pub entries: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayColumn {
    pub day: i32,
    pub name: &'static str,
    pub short_name: &'static str,
    pub date: NaiveDate,
    pub slots: Vec<SlotCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekGrid {
    pub week_offset: i64,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub week_type: WeekType,
    pub selected_day: i32,
    pub days: Vec<DayColumn>,
}

impl WeekGrid {
    pub fn cell(&self, day: i32, slot: i32) -> &[ScheduleEntry] {
        let (Ok(d), Ok(s)) = (usize::try_from(day - MIN_DAY), usize::try_from(slot - MIN_SLOT)) else {
            return &[];
        };
        self.days
            .get(d)
            .and_then(|column| column.slots.get(s))
            .map(|cell| cell.entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn entry_count(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| &d.slots)
            .map(|s| s.entries.len())
            .sum()
    }
}

/// Monday of the week `offset` weeks away from the week containing `today`.
pub fn week_start(today: NaiveDate, offset: i64) -> Result<NaiveDate, SchoolError> {
    let back = u64::from(today.weekday().num_days_from_monday());
    today
        .checked_sub_days(Days::new(back))
        .and_then(|monday| TimeDelta::try_weeks(offset).and_then(|d| monday.checked_add_signed(d)))
        .ok_or_else(|| SchoolError::Validation(format!("week offset {} is out of range", offset)))
}

/// Day highlighted on first display: today for the current week, Monday otherwise.
pub fn selected_day(today: NaiveDate, offset: i64) -> i32 {
    if offset == 0 {
        today.weekday().number_from_monday() as i32
    } else {
        MIN_DAY
    }
}

pub fn week_parity(week_start: NaiveDate) -> WeekType {
    WeekType::for_iso_week(week_start.iso_week().week())
}

/// Place every entry into the cell matching its (day, slot). A cell may hold
/// several entries; rows outside the grid are dropped with a warning.
pub fn assemble(entries: Vec<ScheduleEntry>, today: NaiveDate, offset: i64) -> Result<WeekGrid, SchoolError> {
    let start = week_start(today, offset)?;

    let mut days = Vec::with_capacity(DAY_NAMES.len());
    for day in MIN_DAY..=MAX_DAY {
        let index = (day - MIN_DAY) as usize;
        let date = start
            .checked_add_days(Days::new(index as u64))
            .ok_or_else(|| SchoolError::Validation(format!("week offset {} is out of range", offset)))?;
        let slots = (MIN_SLOT..=MAX_SLOT)
            .map(|slot| SlotCell {
                slot,
                time: slot_label(slot).unwrap_or_default(),
                entries: Vec::new(),
            })
            .collect();
        days.push(DayColumn {
            day,
            name: DAY_NAMES[index],
            short_name: DAY_ABBREVIATIONS[index],
            date,
            slots,
        });
    }

    for entry in entries {
        let day = usize::try_from(entry.day_of_week - MIN_DAY).ok();
        let slot = usize::try_from(entry.slot_number - MIN_SLOT).ok();
        match day
            .zip(slot)
            .and_then(|(d, s)| days.get_mut(d).and_then(|column| column.slots.get_mut(s)))
        {
            Some(cell) => cell.entries.push(entry),
            None => warn!(
                "Grid: schedule {} has out-of-range cell {}:{}",
                entry.schedule_id, entry.day_of_week, entry.slot_number
            ),
        }
    }

    let week_end = days.last().map(|d| d.date).unwrap_or(start);
    Ok(WeekGrid {
        week_offset: offset,
        week_start: start,
        week_end,
        week_type: week_parity(start),
        selected_day: selected_day(today, offset),
        days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: i64, day: i32, slot: i32) -> ScheduleEntry {
        ScheduleEntry {
            schedule_id: id,
            day_of_week: day,
            slot_number: slot,
            week_type: "all".to_string(),
            group_id: 1,
            group_name: "ПКС-21".to_string(),
            course_id: 1,
            course_name: "Базы данных".to_string(),
            teacher_id: 10,
            teacher_name: "teacher".to_string(),
            room_id: 100,
            room_number: "101".to_string(),
            substitute: None,
        }
    }

    #[test]
    fn week_start_is_monday_shifted_by_offset() {
        let wednesday = date(2025, 3, 5);
        assert_eq!(week_start(wednesday, 0).unwrap(), date(2025, 3, 3));
        assert_eq!(week_start(wednesday, 1).unwrap(), date(2025, 3, 10));
        assert_eq!(week_start(wednesday, -1).unwrap(), date(2025, 2, 24));
        assert_eq!(week_start(date(2025, 3, 9), 0).unwrap(), date(2025, 3, 3));
        assert_eq!(week_start(date(2025, 3, 3), 0).unwrap(), date(2025, 3, 3));
    }

    #[test]
    fn absurd_offsets_are_rejected() {
        assert!(matches!(
            week_start(date(2025, 3, 5), i64::MAX),
            Err(SchoolError::Validation(_))
        ));
    }

    #[test]
    fn selected_day_tracks_today_only_for_current_week() {
        let thursday = date(2025, 3, 6);
        assert_eq!(selected_day(thursday, 0), 4);
        assert_eq!(selected_day(thursday, 2), 1);
        assert_eq!(selected_day(thursday, -1), 1);
        assert_eq!(selected_day(date(2025, 3, 9), 0), 7);
    }

    #[test]
    fn grid_is_seven_by_four() {
        let grid = assemble(Vec::new(), date(2025, 3, 5), 0).unwrap();
        assert_eq!(grid.days.len(), 7);
        assert!(grid.days.iter().all(|d| d.slots.len() == 4));
        assert_eq!(grid.days[0].date, date(2025, 3, 3));
        assert_eq!(grid.week_end, date(2025, 3, 9));
        assert_eq!(grid.days[6].short_name, "Вс");
        assert_eq!(grid.days[0].slots[0].time, "08:30–10:00");
        assert_eq!(grid.entry_count(), 0);
    }

    #[test]
    fn entries_land_in_their_cells() {
        let rows = vec![entry(1, 1, 1), entry(2, 3, 4), entry(3, 7, 2), entry(4, 5, 3)];
        let grid = assemble(rows.clone(), date(2025, 3, 5), 0).unwrap();
        for row in &rows {
            let cell = grid.cell(row.day_of_week, row.slot_number);
            assert_eq!(cell, std::slice::from_ref(row));
        }
        assert_eq!(grid.entry_count(), rows.len());
        assert!(grid.cell(2, 2).is_empty());
    }

    #[test]
    fn overlapping_rows_share_a_cell() {
        let grid = assemble(vec![entry(1, 2, 2), entry(2, 2, 2)], date(2025, 3, 5), 0).unwrap();
        let ids: Vec<i64> = grid.cell(2, 2).iter().map(|e| e.schedule_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn out_of_range_rows_are_dropped() {
        let grid = assemble(vec![entry(1, 8, 1), entry(2, 1, 5), entry(3, 0, 0)], date(2025, 3, 5), 0).unwrap();
        assert_eq!(grid.entry_count(), 0);
        assert!(grid.cell(8, 1).is_empty());
    }

    #[test]
    fn slot_labels_cover_four_slots() {
        assert_eq!(slot_label(4).as_deref(), Some("14:00–15:30"));
        assert_eq!(slot_label(5), None);
        assert_eq!(slot_label(0), None);
    }

    #[test]
    fn parity_comes_from_iso_week() {
        // 2025-03-03 is ISO week 10
        assert_eq!(week_parity(date(2025, 3, 3)), WeekType::Even);
        assert_eq!(week_parity(date(2025, 3, 10)), WeekType::Odd);
    }
}
