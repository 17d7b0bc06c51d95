//! Ticket Service
//!
//! Ticket lookup for customers and check-in at the door for staff.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use super::Actor;
use crate::application::dto::response::TicketResponse;
use crate::domain::{TicketRepository, TicketStatus, TicketView};
use crate::shared::error::AppError;

#[async_trait]
pub trait TicketService: Send + Sync {
    /// The caller's tickets, soonest showtime first
    async fn list_mine(&self, actor: Actor) -> Result<Vec<TicketResponse>, TicketError>;

    async fn get_by_code(&self, actor: Actor, code: &str) -> Result<TicketResponse, TicketError>;

    /// Admit the holder of a valid ticket
    async fn check_in(&self, code: &str, now: DateTime<Utc>) -> Result<TicketResponse, TicketError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Ticket not found")]
    NotFound,

    #[error("You do not have access to this ticket")]
    Forbidden,

    #[error("Ticket has already been used")]
    AlreadyUsed,

    #[error("Ticket has been cancelled")]
    Cancelled,

    #[error("Showtime has already ended")]
    ShowtimeEnded,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound => AppError::NotFound(err.to_string()),
            TicketError::Forbidden => AppError::Forbidden(err.to_string()),
            TicketError::AlreadyUsed | TicketError::Cancelled | TicketError::ShowtimeEnded => {
                AppError::Conflict(err.to_string())
            }
            TicketError::Repository(e) => e,
        }
    }
}

pub struct TicketServiceImpl<T>
where
    T: TicketRepository,
{
    ticket_repo: Arc<T>,
}

impl<T> TicketServiceImpl<T>
where
    T: TicketRepository,
{
    pub fn new(ticket_repo: Arc<T>) -> Self {
        Self { ticket_repo }
    }

    async fn load(&self, code: &str) -> Result<TicketView, TicketError> {
        let code = code.trim().to_ascii_uppercase();
        self.ticket_repo
            .find_by_code(&code)
            .await?
            .ok_or(TicketError::NotFound)
    }
}

#[async_trait]
impl<T> TicketService for TicketServiceImpl<T>
where
    T: TicketRepository + 'static,
{
    async fn list_mine(&self, actor: Actor) -> Result<Vec<TicketResponse>, TicketError> {
        let tickets = self.ticket_repo.list_for_user(actor.user_id).await?;
        Ok(tickets.into_iter().map(TicketResponse::from).collect())
    }

    async fn get_by_code(&self, actor: Actor, code: &str) -> Result<TicketResponse, TicketError> {
        let view = self.load(code).await?;
        if !actor.can_access(view.ticket.user_id) {
            return Err(TicketError::Forbidden);
        }
        Ok(view.into())
    }

    #[instrument(skip(self))]
    async fn check_in(&self, code: &str, now: DateTime<Utc>) -> Result<TicketResponse, TicketError> {
        let mut view = self.load(code).await?;

        match view.ticket.status {
            TicketStatus::Used => return Err(TicketError::AlreadyUsed),
            TicketStatus::Cancelled => return Err(TicketError::Cancelled),
            TicketStatus::Valid => {}
        }
        if view.ends_at <= now {
            return Err(TicketError::ShowtimeEnded);
        }

        // Two scanners racing on the same code: only one flip succeeds
        if !self.ticket_repo.mark_used(view.ticket.id, now).await? {
            return Err(TicketError::AlreadyUsed);
        }

        view.ticket.status = TicketStatus::Used;
        view.ticket.used_at = Some(now);
        info!(ticket_id = view.ticket.id, booking_id = view.ticket.booking_id, "Ticket checked in");
        Ok(view.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{Fixture, InMemoryDb};
    use crate::infrastructure::payments::MockPaymentGateway;
    use crate::domain::UserRole;
    use chrono::Duration;

    async fn issued(fx: &Fixture) -> (TicketServiceImpl<InMemoryDb>, String) {
        let gateway = MockPaymentGateway::default();
        let (booking, _) = fx.confirmed_booking(&gateway, &[fx.seats[0].id]).await;
        let code = fx.db.tickets_for(booking.id)[0].ticket_code.clone();
        (TicketServiceImpl::new(Arc::new(fx.db.clone())), code)
    }

    #[tokio::test]
    async fn test_check_in_once() {
        let fx = Fixture::new();
        let (tickets, code) = issued(&fx).await;
        let now = Utc::now();

        let admitted = tickets.check_in(&code, now).await.unwrap();
        assert_eq!(admitted.status, TicketStatus::Used);
        assert_eq!(admitted.used_at, Some(now));
        assert_eq!(admitted.seat_label.as_deref(), Some("A1"));

        let again = tickets.check_in(&code, now).await;
        assert!(matches!(again, Err(TicketError::AlreadyUsed)));
    }

    #[tokio::test]
    async fn test_code_lookup_is_case_insensitive() {
        let fx = Fixture::new();
        let (tickets, code) = issued(&fx).await;

        let found = tickets
            .get_by_code(fx.customer_actor(), &format!(" {} ", code.to_lowercase()))
            .await
            .unwrap();
        assert_eq!(found.ticket_code, code);
    }

    #[tokio::test]
    async fn test_check_in_after_showtime_ended() {
        let fx = Fixture::new();
        let (tickets, code) = issued(&fx).await;

        let late = fx.showtime.ends_at + Duration::minutes(1);
        let err = tickets.check_in(&code, late).await.unwrap_err();
        assert!(matches!(err, TicketError::ShowtimeEnded));

        let app_err = AppError::from(err);
        assert_eq!(app_err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(app_err.code(), 10005);
    }

    #[tokio::test]
    async fn test_other_customers_cannot_view() {
        let fx = Fixture::new();
        let (tickets, code) = issued(&fx).await;
        let stranger = Actor::new(7, UserRole::Customer);

        assert!(matches!(
            tickets.get_by_code(stranger, &code).await,
            Err(TicketError::Forbidden)
        ));
        assert!(tickets.get_by_code(fx.admin_actor(), &code).await.is_ok());
        assert_eq!(tickets.list_mine(fx.customer_actor()).await.unwrap().len(), 1);
    }
}
