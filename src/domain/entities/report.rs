//! Back-office reporting read model.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::shared::error::AppError;

/// Revenue collected on one UTC day, in minor units.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieSales {
    pub movie_id: i64,
    pub title: String,
    pub tickets_sold: i64,
    pub revenue: i64,
}

/// Raw figures for a reporting window. Amounts are minor units.
#[derive(Debug, Clone, Default)]
pub struct SalesReport {
    pub gross_revenue: i64,
    pub refunded: i64,
    pub bookings_by_status: Vec<(String, i64)>,
    pub tickets_sold: i64,
    pub active_movies: i64,
    pub upcoming_showtimes: i64,
    pub revenue_by_day: Vec<DailyRevenue>,
    pub top_movies: Vec<MovieSales>,
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Aggregate activity between `since` and `now`; `top` bounds `top_movies`.
    async fn sales_report(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        top: i64,
    ) -> Result<SalesReport, AppError>;
}
