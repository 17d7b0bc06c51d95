//! Dashboard Service

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::application::dto::request::DashboardQuery;
use crate::application::dto::response::DashboardResponse;
use crate::domain::ReportRepository;
use crate::shared::error::AppError;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const MAX_WINDOW_DAYS: i64 = 365;
const TOP_MOVIES: i64 = 5;

#[async_trait]
pub trait DashboardService: Send + Sync {
    /// Sales figures for the trailing `days` window
    async fn summary(&self, query: DashboardQuery, now: DateTime<Utc>)
        -> Result<DashboardResponse, DashboardError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("days must be between 1 and {MAX_WINDOW_DAYS}")]
    InvalidWindow,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::InvalidWindow => AppError::BadRequest(err.to_string()),
            DashboardError::Repository(e) => e,
        }
    }
}

pub struct DashboardServiceImpl<R>
where
    R: ReportRepository,
{
    report_repo: Arc<R>,
    currency: String,
}

impl<R> DashboardServiceImpl<R>
where
    R: ReportRepository,
{
    pub fn new(report_repo: Arc<R>, currency: impl Into<String>) -> Self {
        Self {
            report_repo,
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl<R> DashboardService for DashboardServiceImpl<R>
where
    R: ReportRepository + 'static,
{
    async fn summary(
        &self,
        query: DashboardQuery,
        now: DateTime<Utc>,
    ) -> Result<DashboardResponse, DashboardError> {
        let days = query.days.unwrap_or(DEFAULT_WINDOW_DAYS);
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            return Err(DashboardError::InvalidWindow);
        }

        let report = self
            .report_repo
            .sales_report(now - Duration::days(days), now, TOP_MOVIES)
            .await?;
        Ok(DashboardResponse::from_report(report, days, &self.currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::Fixture;
    use crate::infrastructure::payments::MockPaymentGateway;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_window_bounds() {
        let fx = Fixture::new();
        let dashboard = DashboardServiceImpl::new(Arc::new(fx.db.clone()), "usd");

        for days in [0, 366] {
            let result = dashboard
                .summary(DashboardQuery { days: Some(days) }, Utc::now())
                .await;
            assert!(matches!(result, Err(DashboardError::InvalidWindow)));
        }
        let summary = dashboard
            .summary(DashboardQuery::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(summary.days, DEFAULT_WINDOW_DAYS);
    }

    #[tokio::test]
    async fn test_summary_counts_confirmed_sales() {
        let fx = Fixture::new();
        let dashboard = DashboardServiceImpl::new(Arc::new(fx.db.clone()), "usd");
        fx.confirmed_booking(&MockPaymentGateway::default(), &[fx.seats[0].id])
            .await;

        let summary = dashboard
            .summary(DashboardQuery { days: Some(7) }, Utc::now())
            .await
            .unwrap();
        assert_eq!(summary.gross_revenue, 1000);
        assert_eq!(summary.net_revenue, 1000);
        assert_eq!(summary.tickets_sold, 1);
        assert_eq!(summary.bookings_by_status.get("confirmed"), Some(&1));
        assert_eq!(summary.top_movies.len(), 1);
        assert_eq!(summary.top_movies[0].title, fx.movie.title);
    }
}
