//! Hall and Seat entities with their repository trait.
//!
//! A hall owns a rectangular seat grid. Rows are lettered `A`..`Z` and
//! seats are numbered from 1 within each row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

pub const MAX_ROWS: i32 = 26;
pub const MAX_SEATS_PER_ROW: i32 = 50;

/// Screen technology of a hall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HallType {
    #[default]
    Standard,
    Imax,
    Vip,
    FourDx,
}

impl HallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Imax => "imax",
            Self::Vip => "vip",
            Self::FourDx => "four_dx",
        }
    }
}

impl std::str::FromStr for HallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "imax" => Ok(Self::Imax),
            "vip" => Ok(Self::Vip),
            "four_dx" | "4dx" => Ok(Self::FourDx),
            other => Err(format!("Unknown hall type '{}'", other)),
        }
    }
}

/// Seat category, which drives the price multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeatType {
    #[default]
    Standard,
    Vip,
    Couple,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Vip => "vip",
            Self::Couple => "couple",
        }
    }
}

impl std::str::FromStr for SeatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "vip" => Ok(Self::Vip),
            "couple" => Ok(Self::Couple),
            other => Err(format!("Unknown seat type '{}'", other)),
        }
    }
}

/// Maps to the `halls` table. `(branch_id, name)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hall {
    pub id: i64,
    pub branch_id: i64,
    pub name: String,
    pub hall_type: HallType,
    pub rows: i32,
    pub seats_per_row: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hall {
    pub fn capacity(&self) -> i32 {
        self.rows * self.seats_per_row
    }
}

/// Maps to the `seats` table. `(hall_id, row_label, number)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub hall_id: i64,
    pub row_label: String,
    pub number: i32,
    pub seat_type: SeatType,
    pub is_active: bool,
}

impl Seat {
    /// Label as printed on a ticket, e.g. `C7`.
    pub fn label(&self) -> String {
        format!("{}{}", self.row_label, self.number)
    }
}

/// Letter for a 1-based row index (`1` -> `A`).
pub fn row_label(row: i32) -> Option<String> {
    if (1..=MAX_ROWS).contains(&row) {
        Some(((b'A' + (row - 1) as u8) as char).to_string())
    } else {
        None
    }
}

/// 1-based row index for a row letter (`A` -> `1`).
pub fn row_index(label: &str) -> Option<i32> {
    let mut chars = label.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Some((c.to_ascii_uppercase() as u8 - b'A') as i32 + 1)
        }
        _ => None,
    }
}

/// Build the seat grid for a freshly created hall.
///
/// Rows listed in `couple_rows` win over `vip_rows` when a row is in both.
pub fn generate_seat_grid(
    hall_id: i64,
    rows: i32,
    seats_per_row: i32,
    vip_rows: &[String],
    couple_rows: &[String],
    mut next_id: impl FnMut() -> i64,
) -> Result<Vec<Seat>, AppError> {
    if !(1..=MAX_ROWS).contains(&rows) {
        return Err(AppError::Validation(format!(
            "rows: must be between 1 and {}",
            MAX_ROWS
        )));
    }
    if !(1..=MAX_SEATS_PER_ROW).contains(&seats_per_row) {
        return Err(AppError::Validation(format!(
            "seats_per_row: must be between 1 and {}",
            MAX_SEATS_PER_ROW
        )));
    }

    let normalize = |labels: &[String]| -> Result<Vec<i32>, AppError> {
        labels
            .iter()
            .map(|label| match row_index(label) {
                Some(index) if index <= rows => Ok(index),
                _ => Err(AppError::Validation(format!(
                    "Row '{}' does not exist in a hall with {} rows",
                    label, rows
                ))),
            })
            .collect()
    };
    let vip = normalize(vip_rows)?;
    let couple = normalize(couple_rows)?;

    let mut seats = Vec::with_capacity((rows * seats_per_row) as usize);
    for row in 1..=rows {
        let seat_type = if couple.contains(&row) {
            SeatType::Couple
        } else if vip.contains(&row) {
            SeatType::Vip
        } else {
            SeatType::Standard
        };
        // row is within 1..=26 here
        let label = row_label(row).unwrap_or_default();
        for number in 1..=seats_per_row {
            seats.push(Seat {
                id: next_id(),
                hall_id,
                row_label: label.clone(),
                number,
                seat_type,
                is_active: true,
            });
        }
    }

    Ok(seats)
}

#[async_trait]
pub trait HallRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Hall>, AppError>;

    async fn list_by_branch(&self, branch_id: i64, active_only: bool)
        -> Result<Vec<Hall>, AppError>;

    /// Insert the hall and its whole seat grid in one transaction.
    async fn create_with_seats(&self, hall: &Hall, seats: &[Seat]) -> Result<Hall, AppError>;

    async fn update(&self, hall: &Hall) -> Result<Hall, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    async fn has_showtimes(&self, id: i64) -> Result<bool, AppError>;

    /// All seats of a hall ordered by row then number.
    async fn seats(&self, hall_id: i64) -> Result<Vec<Seat>, AppError>;

    async fn find_seat(&self, seat_id: i64) -> Result<Option<Seat>, AppError>;

    /// The subset of `seat_ids` that belongs to the hall.
    async fn find_seats(&self, hall_id: i64, seat_ids: &[i64]) -> Result<Vec<Seat>, AppError>;

    async fn update_seat(&self, seat: &Seat) -> Result<Seat, AppError>;
}
