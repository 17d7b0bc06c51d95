//! Showtime scheduling and sales window rules.

use chrono::{DateTime, Duration, Utc};

/// End of a screening that starts at `starts_at`.
pub fn screening_end(starts_at: DateTime<Utc>, duration_minutes: i32) -> DateTime<Utc> {
    starts_at + Duration::minutes(duration_minutes as i64)
}

/// The span another showtime in the same hall must stay clear of.
///
/// A neighbour conflicts when it starts before `to` and ends after `from`.
pub fn blocked_window(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    cleaning_buffer_minutes: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let buffer = Duration::minutes(cleaning_buffer_minutes);
    (starts_at - buffer, ends_at + buffer)
}

/// Whether two screenings collide once the cleaning buffer follows each.
pub fn overlaps(
    a: (DateTime<Utc>, DateTime<Utc>),
    b: (DateTime<Utc>, DateTime<Utc>),
    cleaning_buffer_minutes: i64,
) -> bool {
    let buffer = Duration::minutes(cleaning_buffer_minutes);
    a.0 < b.1 + buffer && b.0 < a.1 + buffer
}

/// Ticket sales close `cutoff_minutes` before the start.
pub fn sales_open(starts_at: DateTime<Utc>, now: DateTime<Utc>, cutoff_minutes: i64) -> bool {
    now < starts_at - Duration::minutes(cutoff_minutes)
}

/// Confirmed bookings can be cancelled until `cutoff_hours` before the start.
pub fn cancellation_open(starts_at: DateTime<Utc>, now: DateTime<Utc>, cutoff_hours: i64) -> bool {
    now < starts_at - Duration::hours(cutoff_hours)
}
