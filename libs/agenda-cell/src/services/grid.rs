// libs/agenda-cell/src/services/grid.rs
//
// Walks a day's business hours in fixed-duration steps and overlays the
// day's appointments, producing the ordered slot grid the day view
// renders. Pure: no store access, recomputed on every request.
use tracing::warn;

use crate::models::{
    Appointment, AgendaError, DayHours, SlotKind, TimePoint, TimeSlot, MINUTES_PER_DAY,
};

struct PlacedAppointment<'a> {
    start: TimePoint,
    end: TimePoint,
    appointment: &'a Appointment,
    covered: bool,
}

/// Generate the ordered slot grid for one day.
///
/// Appointments are assumed non-overlapping with each other (the
/// conflict detector enforces that at booking time); at most the first
/// overlapping appointment is used per step. A day without open/close
/// hours yields an empty grid. A slot duration that does not evenly
/// divide the open span produces a final step that runs past closing,
/// bounded by the walk itself.
pub fn generate_slots(
    day: &DayHours,
    appointments: &[Appointment],
    slot_minutes: u16,
) -> Result<Vec<TimeSlot>, AgendaError> {
    let (opens_at, closes_at) = match (day.opens_at, day.closes_at) {
        (Some(opens_at), Some(closes_at)) => (opens_at, closes_at),
        _ => return Ok(Vec::new()),
    };

    // A duration outside (0, 1440) cannot describe a real slot, and an
    // oversized one would overflow the u16 step arithmetic below.
    if slot_minutes == 0 || slot_minutes >= MINUTES_PER_DAY {
        warn!(
            "Implausible slot duration {} requested, returning empty grid",
            slot_minutes
        );
        return Ok(Vec::new());
    }

    let mut placed = Vec::with_capacity(appointments.len());
    for appointment in appointments {
        placed.push(PlacedAppointment {
            start: appointment.start_minutes()?,
            end: appointment.end_minutes()?,
            appointment,
            covered: false,
        });
    }
    placed.sort_by_key(|p| p.start);

    let mut slots = Vec::new();
    let mut t = opens_at;
    while t < closes_at {
        let slot_end = t + slot_minutes;

        let covering = placed
            .iter_mut()
            .find(|p| p.start < slot_end && p.end > t);

        let slot = match covering {
            Some(p) if !p.covered => {
                p.covered = true;
                TimeSlot {
                    start: t,
                    end: slot_end,
                    kind: SlotKind::Occupied,
                    appointment: Some(p.appointment.clone()),
                    span_count: Some(span_count(p.start, p.end, slot_minutes)),
                }
            }
            Some(_) => TimeSlot {
                start: t,
                end: slot_end,
                kind: SlotKind::Continuation,
                appointment: None,
                span_count: None,
            },
            None if in_break(day, t) => TimeSlot {
                start: t,
                end: slot_end,
                kind: SlotKind::Break,
                appointment: None,
                span_count: None,
            },
            None => TimeSlot {
                start: t,
                end: slot_end,
                kind: SlotKind::Available,
                appointment: None,
                span_count: None,
            },
        };

        slots.push(slot);
        t += slot_minutes;
    }

    // Appointments the regular walk never touched, e.g. booked off-grid
    // or outside the open window by an override. Inserted at their
    // natural start, latest first so multiple insertions at the same
    // anchor keep chronological order.
    let mut unplaced: Vec<&PlacedAppointment> = placed.iter().filter(|p| !p.covered).collect();
    unplaced.sort_by(|a, b| b.start.cmp(&a.start));

    for p in unplaced {
        let index = slots
            .iter()
            .rposition(|s| s.start <= p.start)
            .map(|i| i + 1)
            .unwrap_or(0);
        slots.insert(
            index,
            TimeSlot {
                start: p.start,
                end: p.end,
                kind: SlotKind::Occupied,
                appointment: Some(p.appointment.clone()),
                span_count: Some(span_count(p.start, p.end, slot_minutes)),
            },
        );
    }

    Ok(slots)
}

fn span_count(start: TimePoint, end: TimePoint, slot_minutes: u16) -> u32 {
    (end.saturating_sub(start) as u32).div_ceil(slot_minutes as u32)
}

fn in_break(day: &DayHours, t: TimePoint) -> bool {
    match (day.break_start, day.break_end) {
        (Some(break_start), Some(break_end)) => t >= break_start && t < break_end,
        _ => false,
    }
}
