use assert_matches::assert_matches;
use chrono::NaiveDate;
use uuid::Uuid;

use agenda_cell::models::{AgendaError, Appointment, AppointmentStatus, DayHours, SlotKind};
use agenda_cell::services::grid::generate_slots;

fn day(opens_at: u16, closes_at: u16) -> DayHours {
    DayHours {
        opens_at: Some(opens_at),
        closes_at: Some(closes_at),
        ..DayHours::default()
    }
}

fn appointment(start_time: &str, end_time: &str) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        clinic_id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        start_time: start_time.to_string(),
        end_time: end_time.to_string(),
        status: AppointmentStatus::Scheduled,
        patient_id: Uuid::new_v4(),
        patient_name: "Alice Martin".to_string(),
    }
}

#[test]
fn closed_day_yields_empty_grid() {
    let slots = generate_slots(&DayHours::default(), &[], 30).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn zero_slot_duration_yields_empty_grid() {
    let slots = generate_slots(&day(480, 600), &[], 0).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn oversized_slot_duration_yields_empty_grid() {
    // A duration of a day or more would overflow the minute walk; it is
    // rejected up front instead.
    let slots = generate_slots(&day(1, 1400), &[], u16::MAX).unwrap();
    assert!(slots.is_empty());

    let slots = generate_slots(&day(480, 600), &[], 1440).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn largest_plausible_slot_duration_is_walked() {
    let slots = generate_slots(&day(0, 1439), &[], 1439).unwrap();

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].start, 0);
    assert_eq!(slots[0].end, 1439);
    assert_eq!(slots[0].kind, SlotKind::Available);
}

#[test]
fn free_day_is_all_available() {
    // 08:00-10:00 in 30 minute steps
    let slots = generate_slots(&day(480, 600), &[], 30).unwrap();

    assert_eq!(slots.len(), 4);
    let starts: Vec<u16> = slots.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![480, 510, 540, 570]);
    assert!(slots.iter().all(|s| s.kind == SlotKind::Available));
    assert!(slots.iter().all(|s| s.end == s.start + 30));
}

#[test]
fn appointment_occupies_first_step_and_continues() {
    let appt = appointment("08:00", "09:00");
    let slots = generate_slots(&day(480, 600), &[appt.clone()], 30).unwrap();

    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0].kind, SlotKind::Occupied);
    assert_eq!(slots[0].span_count, Some(2));
    assert_eq!(slots[0].appointment.as_ref().unwrap().id, appt.id);
    assert_eq!(slots[1].kind, SlotKind::Continuation);
    assert!(slots[1].appointment.is_none());
    assert_eq!(slots[2].kind, SlotKind::Available);
    assert_eq!(slots[3].kind, SlotKind::Available);
}

#[test]
fn span_count_rounds_up_partial_slots() {
    // 50 minutes in 30 minute steps spans two slots
    let appt = appointment("08:00", "08:50");
    let slots = generate_slots(&day(480, 600), &[appt], 30).unwrap();

    assert_eq!(slots[0].kind, SlotKind::Occupied);
    assert_eq!(slots[0].span_count, Some(2));
    assert_eq!(slots[1].kind, SlotKind::Continuation);
    assert_eq!(slots[2].kind, SlotKind::Available);
}

#[test]
fn break_window_marks_slots() {
    let hours = DayHours {
        break_start: Some(540),
        break_end: Some(570),
        ..day(480, 600)
    };
    let slots = generate_slots(&hours, &[], 30).unwrap();

    assert_eq!(slots[0].kind, SlotKind::Available);
    assert_eq!(slots[1].kind, SlotKind::Available);
    assert_eq!(slots[2].kind, SlotKind::Break);
    assert_eq!(slots[3].kind, SlotKind::Available);
}

#[test]
fn appointment_takes_precedence_over_break() {
    let hours = DayHours {
        break_start: Some(540),
        break_end: Some(570),
        ..day(480, 600)
    };
    let appt = appointment("09:00", "09:30");
    let slots = generate_slots(&hours, &[appt], 30).unwrap();

    assert_eq!(slots[2].kind, SlotKind::Occupied);
}

#[test]
fn boundary_touching_appointments_do_not_bleed() {
    // Ends exactly at 09:00; the 09:00 slot stays free.
    let appt = appointment("08:30", "09:00");
    let slots = generate_slots(&day(480, 600), &[appt], 30).unwrap();

    assert_eq!(slots[0].kind, SlotKind::Available);
    assert_eq!(slots[1].kind, SlotKind::Occupied);
    assert_eq!(slots[2].kind, SlotKind::Available);
}

#[test]
fn uneven_division_runs_past_closing() {
    // 08:00-09:15 in 30 minute steps: the last slot ends at 09:30.
    let slots = generate_slots(&day(480, 555), &[], 30).unwrap();

    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2].start, 540);
    assert_eq!(slots[2].end, 570);
}

#[test]
fn off_grid_appointment_is_absorbed_by_the_walk() {
    // 08:10-08:40 straddles two steps; the first covers it, the second
    // is a continuation, nothing is injected.
    let appt = appointment("08:10", "08:40");
    let slots = generate_slots(&day(480, 600), &[appt], 30).unwrap();

    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0].kind, SlotKind::Occupied);
    assert_eq!(slots[0].start, 480);
    assert_eq!(slots[1].kind, SlotKind::Continuation);
}

#[test]
fn appointment_before_opening_is_injected_first() {
    let appt = appointment("07:00", "07:30");
    let slots = generate_slots(&day(480, 600), &[appt.clone()], 30).unwrap();

    assert_eq!(slots.len(), 5);
    assert_eq!(slots[0].kind, SlotKind::Occupied);
    assert_eq!(slots[0].start, 420);
    assert_eq!(slots[0].end, 450);
    assert_eq!(slots[0].span_count, Some(1));
    assert_eq!(slots[0].appointment.as_ref().unwrap().id, appt.id);
    assert_eq!(slots[1].start, 480);
}

#[test]
fn appointment_after_closing_is_injected_last() {
    let appt = appointment("10:30", "11:00");
    let slots = generate_slots(&day(480, 600), &[appt], 30).unwrap();

    assert_eq!(slots.len(), 5);
    let last = slots.last().unwrap();
    assert_eq!(last.kind, SlotKind::Occupied);
    assert_eq!(last.start, 630);
    assert_eq!(last.end, 660);
}

#[test]
fn multiple_injected_appointments_keep_chronological_order() {
    let early = appointment("07:00", "07:20");
    let later = appointment("07:20", "07:40");
    let slots = generate_slots(&day(480, 600), &[later.clone(), early.clone()], 30).unwrap();

    assert_eq!(slots.len(), 6);
    assert_eq!(slots[0].appointment.as_ref().unwrap().id, early.id);
    assert_eq!(slots[1].appointment.as_ref().unwrap().id, later.id);
    assert_eq!(slots[2].start, 480);
}

#[test]
fn malformed_stored_time_surfaces_as_invalid_format() {
    let mut appt = appointment("08:00", "09:00");
    appt.end_time = "9h".to_string();

    let result = generate_slots(&day(480, 600), &[appt], 30);
    assert_matches!(result, Err(AgendaError::InvalidFormat(_)));
}
