//! Hall Service
//!
//! Halls and their seat grids. A hall's seats are generated once, when the
//! hall is created; afterwards only individual seats change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::application::dto::request::{CreateHallRequest, UpdateHallRequest, UpdateSeatRequest};
use crate::application::dto::response::{HallDetailResponse, HallResponse, SeatResponse};
use crate::domain::{generate_seat_grid, BranchRepository, Hall, HallRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{parse_id, validate};

#[async_trait]
pub trait HallService: Send + Sync {
    async fn get_with_seats(&self, id: i64) -> Result<HallDetailResponse, HallError>;

    async fn create(&self, request: CreateHallRequest) -> Result<HallDetailResponse, HallError>;

    async fn update(&self, id: i64, request: UpdateHallRequest) -> Result<HallResponse, HallError>;

    async fn delete(&self, id: i64) -> Result<(), HallError>;

    async fn update_seat(
        &self,
        hall_id: i64,
        seat_id: i64,
        request: UpdateSeatRequest,
    ) -> Result<SeatResponse, HallError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HallError {
    #[error("Hall not found")]
    NotFound,

    #[error("Seat not found")]
    SeatNotFound,

    #[error("Branch not found")]
    BranchNotFound,

    #[error("Branch is not active")]
    BranchInactive,

    #[error("Hall still has showtimes")]
    HasShowtimes,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<HallError> for AppError {
    fn from(err: HallError) -> Self {
        match err {
            HallError::NotFound | HallError::SeatNotFound | HallError::BranchNotFound => {
                AppError::NotFound(err.to_string())
            }
            HallError::BranchInactive => AppError::BadRequest(err.to_string()),
            HallError::HasShowtimes => AppError::Conflict(err.to_string()),
            HallError::Repository(e) => e,
        }
    }
}

pub struct HallServiceImpl<H, B>
where
    H: HallRepository,
    B: BranchRepository,
{
    hall_repo: Arc<H>,
    branch_repo: Arc<B>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<H, B> HallServiceImpl<H, B>
where
    H: HallRepository,
    B: BranchRepository,
{
    pub fn new(hall_repo: Arc<H>, branch_repo: Arc<B>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            hall_repo,
            branch_repo,
            id_generator,
        }
    }

    async fn load(&self, id: i64) -> Result<Hall, HallError> {
        self.hall_repo.find_by_id(id).await?.ok_or(HallError::NotFound)
    }
}

#[async_trait]
impl<H, B> HallService for HallServiceImpl<H, B>
where
    H: HallRepository + 'static,
    B: BranchRepository + 'static,
{
    async fn get_with_seats(&self, id: i64) -> Result<HallDetailResponse, HallError> {
        let hall = self.load(id).await?;
        let seats = self.hall_repo.seats(id).await?;
        Ok(HallDetailResponse {
            hall: hall.into(),
            seats: seats.into_iter().map(SeatResponse::from).collect(),
        })
    }

    async fn create(&self, request: CreateHallRequest) -> Result<HallDetailResponse, HallError> {
        validate(&request)?;
        let branch_id = parse_id(&request.branch_id, "branch")?;
        let branch = self
            .branch_repo
            .find_by_id(branch_id)
            .await?
            .ok_or(HallError::BranchNotFound)?;
        if !branch.is_active {
            return Err(HallError::BranchInactive);
        }

        let now = Utc::now();
        let hall = Hall {
            id: self.id_generator.generate(),
            branch_id,
            name: request.name.trim().to_string(),
            hall_type: request.hall_type,
            rows: request.rows,
            seats_per_row: request.seats_per_row,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let seats = generate_seat_grid(
            hall.id,
            hall.rows,
            hall.seats_per_row,
            &request.vip_rows,
            &request.couple_rows,
            || self.id_generator.generate(),
        )?;

        let created = self.hall_repo.create_with_seats(&hall, &seats).await?;
        info!(hall_id = created.id, seats = seats.len(), "Hall created");

        Ok(HallDetailResponse {
            hall: created.into(),
            seats: seats.into_iter().map(SeatResponse::from).collect(),
        })
    }

    async fn update(&self, id: i64, request: UpdateHallRequest) -> Result<HallResponse, HallError> {
        validate(&request)?;
        let mut hall = self.load(id).await?;

        if let Some(name) = request.name {
            hall.name = name.trim().to_string();
        }
        if let Some(hall_type) = request.hall_type {
            hall.hall_type = hall_type;
        }
        if let Some(is_active) = request.is_active {
            hall.is_active = is_active;
        }
        hall.updated_at = Utc::now();

        Ok(self.hall_repo.update(&hall).await?.into())
    }

    async fn delete(&self, id: i64) -> Result<(), HallError> {
        self.load(id).await?;
        if self.hall_repo.has_showtimes(id).await? {
            return Err(HallError::HasShowtimes);
        }
        self.hall_repo.delete(id).await?;
        Ok(())
    }

    async fn update_seat(
        &self,
        hall_id: i64,
        seat_id: i64,
        request: UpdateSeatRequest,
    ) -> Result<SeatResponse, HallError> {
        let mut seat = self
            .hall_repo
            .find_seat(seat_id)
            .await?
            .filter(|s| s.hall_id == hall_id)
            .ok_or(HallError::SeatNotFound)?;

        if let Some(seat_type) = request.seat_type {
            seat.seat_type = seat_type;
        }
        if let Some(is_active) = request.is_active {
            seat.is_active = is_active;
        }

        Ok(self.hall_repo.update_seat(&seat).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{Fixture, InMemoryDb};
    use crate::domain::{HallType, SeatType};

    fn service(db: &InMemoryDb) -> HallServiceImpl<InMemoryDb, InMemoryDb> {
        HallServiceImpl::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(SnowflakeGenerator::new(1, 3)),
        )
    }

    fn request(branch_id: i64) -> CreateHallRequest {
        CreateHallRequest {
            branch_id: branch_id.to_string(),
            name: "Hall 9".into(),
            hall_type: HallType::Imax,
            rows: 3,
            seats_per_row: 4,
            vip_rows: vec!["B".into()],
            couple_rows: vec!["c".into()],
        }
    }

    #[tokio::test]
    async fn test_create_generates_seat_grid() {
        let fx = Fixture::new();
        let halls = service(&fx.db);

        let created = halls.create(request(fx.branch.id)).await.unwrap();

        assert_eq!(created.hall.capacity, 12);
        assert_eq!(created.seats.len(), 12);
        assert!(created.seats.iter().filter(|s| s.row_label == "B").all(|s| s.seat_type == SeatType::Vip));
        assert!(created.seats.iter().filter(|s| s.row_label == "C").all(|s| s.seat_type == SeatType::Couple));

        let reloaded = halls
            .get_with_seats(created.hall.id.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(reloaded.seats.len(), 12);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_branch() {
        let fx = Fixture::new();
        let halls = service(&fx.db);
        assert!(matches!(
            halls.create(request(999)).await,
            Err(HallError::BranchNotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_refused_while_showtimes_exist() {
        let fx = Fixture::new();
        let halls = service(&fx.db);
        assert!(matches!(
            halls.delete(fx.hall.id).await,
            Err(HallError::HasShowtimes)
        ));
    }

    #[tokio::test]
    async fn test_update_seat_must_belong_to_hall() {
        let fx = Fixture::new();
        let halls = service(&fx.db);

        let updated = halls
            .update_seat(
                fx.hall.id,
                fx.seats[0].id,
                UpdateSeatRequest {
                    seat_type: None,
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);

        let wrong_hall = halls
            .update_seat(fx.hall.id + 1, fx.seats[0].id, UpdateSeatRequest::default())
            .await;
        assert!(matches!(wrong_hall, Err(HallError::SeatNotFound)));
    }
}
