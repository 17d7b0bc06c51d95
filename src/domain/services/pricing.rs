//! Seat pricing rules.
//!
//! A seat costs the showtime base price scaled by its seat type. All
//! arithmetic is integer percent on minor units, rounded half-up.

use crate::domain::entities::{BookingSeat, Seat, SeatType};
use crate::domain::value_objects::Money;
use crate::shared::error::AppError;

/// Price multiplier for a seat type, in percent.
pub fn multiplier_percent(seat_type: SeatType) -> i64 {
    match seat_type {
        SeatType::Standard => 100,
        SeatType::Vip => 150,
        SeatType::Couple => 200,
    }
}

pub fn seat_price(base_price: &Money, seat_type: SeatType) -> Result<Money, AppError> {
    base_price.percent(multiplier_percent(seat_type))
}

/// Price every seat and sum the booking total.
pub fn price_seats(base_price: &Money, seats: &[Seat]) -> Result<(Vec<BookingSeat>, Money), AppError> {
    let mut total = Money::zero(base_price.currency.clone());
    let mut priced = Vec::with_capacity(seats.len());

    for seat in seats {
        let price = seat_price(base_price, seat.seat_type)?;
        total = total.checked_add(&price)?;
        priced.push(BookingSeat {
            seat_id: seat.id,
            row_label: seat.row_label.clone(),
            number: seat.number,
            seat_type: seat.seat_type,
            price: price.amount,
        });
    }

    Ok((priced, total))
}
