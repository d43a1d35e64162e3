//! PostgreSQL-backed [`MarketStore`].
//!
//! Coordinates are stored as plain `lat`/`lng` columns; great-circle distance is
//! computed in SQL so nearest-first ordering and radius bounds happen in the
//! database. Dynamic predicates are assembled with `sqlx::QueryBuilder`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{MarketStore, StoreError, WorkerOrderQuery, WorkerQuery, MAX_SCAN};
use crate::geo::GeoPoint;
use crate::models::ad::{Ad, AdQuery, AdSort};
use crate::models::profile::{DemandTerm, Fair, SellerProfile, SellerRole};
use crate::models::worker::{Worker, WorkerActivity, WorkerOrder, WorkerStats};

const AD_COLUMNS: &str = "id, seller_id, title, description, price, currency, photos, \
     category_id, lat, lng, is_farmer_ad, is_free_giveaway, created_at, views, status";

const WORKER_COLUMNS: &str = "id, name, categories, lat, lng, rating, reviews_count, \
     completed_orders_count, active_orders_count, response_rate, avg_response_minutes, \
     experience_years, is_verified, is_pro, is_team, is_active, last_active_at";

const ORDER_COLUMNS: &str = "id, customer_id, title, category, lat, lng, status, urgency, \
     budget_from, budget_to, created_at";

#[derive(Clone)]
pub struct PgMarketStore {
    pool: PgPool,
}

impl PgMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Row types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct AdRow {
    id: Uuid,
    seller_id: Uuid,
    title: String,
    description: Option<String>,
    price: Option<f64>,
    currency: String,
    photos: Vec<String>,
    category_id: String,
    lat: Option<f64>,
    lng: Option<f64>,
    is_farmer_ad: bool,
    is_free_giveaway: bool,
    created_at: DateTime<Utc>,
    views: i64,
    status: String,
}

#[derive(Debug, FromRow)]
struct AdDistanceRow {
    #[sqlx(flatten)]
    ad: AdRow,
    distance_km: f64,
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: Uuid,
    display_name: String,
    role: String,
    avatar_url: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    active_ads_count: i64,
    rating: Option<f64>,
    distance_km: Option<f64>,
}

#[derive(Debug, FromRow)]
struct FairRow {
    id: Uuid,
    title: String,
    city: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    cover_url: Option<String>,
}

#[derive(Debug, FromRow)]
struct WorkerRow {
    id: Uuid,
    name: String,
    categories: Vec<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    rating: f64,
    reviews_count: i64,
    completed_orders_count: i64,
    active_orders_count: i64,
    response_rate: f64,
    avg_response_minutes: Option<f64>,
    experience_years: f64,
    is_verified: bool,
    is_pro: bool,
    is_team: bool,
    is_active: bool,
    last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct WorkerDistanceRow {
    #[sqlx(flatten)]
    worker: WorkerRow,
    distance_km: Option<f64>,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    title: String,
    category: String,
    lat: Option<f64>,
    lng: Option<f64>,
    status: String,
    urgency: String,
    budget_from: Option<f64>,
    budget_to: Option<f64>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OrderDistanceRow {
    #[sqlx(flatten)]
    order: OrderRow,
    distance_km: Option<f64>,
}

fn point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    GeoPoint::from_optional(lat, lng)
}

impl TryFrom<AdRow> for Ad {
    type Error = StoreError;

    fn try_from(row: AdRow) -> Result<Self, Self::Error> {
        Ok(Ad {
            id: row.id,
            seller_id: row.seller_id,
            title: row.title,
            description: row.description,
            price: row.price,
            currency: row.currency,
            photos: row.photos,
            category_id: row.category_id,
            location: point(row.lat, row.lng),
            is_farmer_ad: row.is_farmer_ad,
            is_free_giveaway: row.is_free_giveaway,
            created_at: row.created_at,
            views: row.views,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
        })
    }
}

impl TryFrom<ProfileRow> for SellerProfile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(SellerProfile {
            id: row.id,
            display_name: row.display_name,
            role: row.role.parse().map_err(StoreError::Corrupt)?,
            avatar_url: row.avatar_url,
            location: point(row.lat, row.lng),
            active_ads_count: row.active_ads_count,
            rating: row.rating,
        })
    }
}

impl From<FairRow> for Fair {
    fn from(row: FairRow) -> Self {
        Fair {
            id: row.id,
            title: row.title,
            city: row.city,
            location: point(row.lat, row.lng),
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            cover_url: row.cover_url,
        }
    }
}

impl From<WorkerRow> for Worker {
    fn from(row: WorkerRow) -> Self {
        Worker {
            id: row.id,
            name: row.name,
            categories: row.categories,
            location: point(row.lat, row.lng),
            rating: row.rating,
            reviews_count: row.reviews_count,
            completed_orders_count: row.completed_orders_count,
            active_orders_count: row.active_orders_count,
            response_rate: row.response_rate,
            avg_response_minutes: row.avg_response_minutes,
            experience_years: row.experience_years,
            is_verified: row.is_verified,
            is_pro: row.is_pro,
            is_team: row.is_team,
            is_active: row.is_active,
            last_active_at: row.last_active_at,
        }
    }
}

impl TryFrom<OrderRow> for WorkerOrder {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(WorkerOrder {
            id: row.id,
            customer_id: row.customer_id,
            title: row.title,
            category: row.category,
            location: point(row.lat, row.lng),
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            urgency: row.urgency.parse().map_err(StoreError::Corrupt)?,
            budget_from: row.budget_from,
            budget_to: row.budget_to,
            created_at: row.created_at,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SQL fragments
// ────────────────────────────────────────────────────────────────────────────

/// Pushes the haversine distance (km) from `center` to the row's lat/lng.
fn push_distance(qb: &mut QueryBuilder<'_, Postgres>, center: GeoPoint) {
    qb.push("(6371.0 * 2 * asin(least(1.0, sqrt(power(sin(radians(lat - ")
        .push_bind(center.lat)
        .push(") / 2), 2) + cos(radians(")
        .push_bind(center.lat)
        .push(")) * cos(radians(lat)) * power(sin(radians(lng - ")
        .push_bind(center.lng)
        .push(") / 2), 2)))))");
}

fn push_nullable_distance(qb: &mut QueryBuilder<'_, Postgres>, center: Option<GeoPoint>) {
    match center {
        Some(c) => {
            qb.push("CASE WHEN lat IS NULL OR lng IS NULL THEN NULL ELSE ");
            push_distance(qb, c);
            qb.push(" END");
        }
        None => {
            qb.push("NULL::float8");
        }
    }
}

fn escape_like(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Pushes `WHERE ...` for an ad query: status, category constraint AND keyword constraint.
fn push_ad_predicate(
    qb: &mut QueryBuilder<'_, Postgres>,
    query: &AdQuery,
    exclude: &HashSet<Uuid>,
) {
    qb.push(" WHERE status = 'active'");

    let filter = &query.filter;
    if !filter.category_ids.is_empty() {
        qb.push(" AND category_id = ANY(")
            .push_bind(filter.category_ids.clone())
            .push(")");
    }
    if let Some(v) = filter.is_farmer_ad {
        qb.push(" AND is_farmer_ad = ").push_bind(v);
    }
    if let Some(v) = filter.is_free_giveaway {
        qb.push(" AND is_free_giveaway = ").push_bind(v);
    }

    if !query.keywords.is_empty() {
        qb.push(" AND (");
        for (i, kw) in query.keywords.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            let pattern = escape_like(kw);
            qb.push("title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR coalesce(description, '') ILIKE ")
                .push_bind(pattern);
        }
        qb.push(")");
    }

    if !exclude.is_empty() {
        qb.push(" AND NOT (id = ANY(")
            .push_bind(exclude.iter().copied().collect::<Vec<Uuid>>())
            .push("))");
    }
}

fn order_by(sort: AdSort) -> &'static str {
    match sort {
        AdSort::Newest => " ORDER BY created_at DESC",
        AdSort::Popular => " ORDER BY views DESC, created_at DESC",
        AdSort::PriceAsc => " ORDER BY price ASC NULLS LAST",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MarketStore impl
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn find_ads_near(
        &self,
        query: &AdQuery,
        center: GeoPoint,
        max_distance_km: f64,
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<(Ad, f64)>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM (SELECT ");
        qb.push(AD_COLUMNS).push(", ");
        push_distance(&mut qb, center);
        qb.push(" AS distance_km FROM ads");
        push_ad_predicate(&mut qb, query, exclude);
        qb.push(" AND lat IS NOT NULL AND lng IS NOT NULL) nearby WHERE distance_km <= ")
            .push_bind(max_distance_km)
            .push(" ORDER BY distance_km ASC LIMIT ")
            .push_bind(limit as i64);

        let rows: Vec<AdDistanceRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| Ok((Ad::try_from(r.ad)?, r.distance_km)))
            .collect()
    }

    async fn find_ads(
        &self,
        query: &AdQuery,
        sort: AdSort,
        exclude: &HashSet<Uuid>,
        limit: usize,
    ) -> Result<Vec<Ad>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(AD_COLUMNS).push(" FROM ads");
        push_ad_predicate(&mut qb, query, exclude);
        qb.push(order_by(sort))
            .push(" LIMIT ")
            .push_bind(limit as i64);

        let rows: Vec<AdRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Ad::try_from).collect()
    }

    async fn count_ads_near(
        &self,
        query: &AdQuery,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ads");
        push_ad_predicate(&mut qb, query, &HashSet::new());
        qb.push(" AND lat IS NOT NULL AND lng IS NOT NULL AND ");
        push_distance(&mut qb, center);
        qb.push(" <= ").push_bind(radius_km);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn find_profiles(
        &self,
        role: SellerRole,
        center: Option<GeoPoint>,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<(SellerProfile, Option<f64>)>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT * FROM (SELECT id, display_name, role, avatar_url, lat, lng, \
             active_ads_count, rating, ",
        );
        push_nullable_distance(&mut qb, center);
        qb.push(" AS distance_km FROM seller_profiles WHERE role = ")
            .push_bind(role.as_str())
            .push(" AND active_ads_count > 0) p");
        if center.is_some() {
            qb.push(" WHERE distance_km <= ")
                .push_bind(radius_km)
                .push(" ORDER BY distance_km ASC");
        } else {
            qb.push(" ORDER BY active_ads_count DESC");
        }
        qb.push(" LIMIT ").push_bind(limit as i64);

        let rows: Vec<ProfileRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| {
                let distance = r.distance_km;
                Ok((SellerProfile::try_from(r)?, distance))
            })
            .collect()
    }

    async fn top_demand_terms(
        &self,
        center: Option<GeoPoint>,
        radius_km: f64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DemandTerm>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT lower(trim(query)) AS query, COUNT(*) AS count FROM search_logs \
             WHERE created_at >= ",
        );
        qb.push_bind(since).push(" AND trim(query) <> ''");
        if let Some(c) = center {
            qb.push(" AND lat IS NOT NULL AND lng IS NOT NULL AND ");
            push_distance(&mut qb, c);
            qb.push(" <= ").push_bind(radius_km);
        }
        qb.push(" GROUP BY 1 ORDER BY count DESC, query ASC LIMIT ")
            .push_bind(limit as i64);

        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(query, count)| DemandTerm { query, count })
            .collect())
    }

    async fn active_fairs(
        &self,
        at: DateTime<Utc>,
        center: Option<GeoPoint>,
        limit: usize,
    ) -> Result<Vec<Fair>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, title, city, lat, lng, starts_at, ends_at, cover_url FROM fairs \
             WHERE starts_at <= ",
        );
        qb.push_bind(at).push(" AND ends_at >= ").push_bind(at);
        qb.push(" ORDER BY ");
        push_nullable_distance(&mut qb, center);
        qb.push(" ASC NULLS LAST, starts_at ASC LIMIT ")
            .push_bind(limit as i64);

        let rows: Vec<FairRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Fair::from).collect())
    }

    async fn get_worker(&self, id: Uuid) -> Result<Option<Worker>, StoreError> {
        let row: Option<WorkerRow> =
            sqlx::query_as(&format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Worker::from))
    }

    async fn get_worker_order(&self, id: Uuid) -> Result<Option<WorkerOrder>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM worker_orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(WorkerOrder::try_from).transpose()
    }

    async fn find_workers(
        &self,
        query: &WorkerQuery,
    ) -> Result<Vec<(Worker, Option<f64>)>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM (SELECT ");
        qb.push(WORKER_COLUMNS).push(", ");
        push_nullable_distance(&mut qb, query.center);
        qb.push(" AS distance_km FROM workers WHERE is_active");
        if let Some(category) = &query.category {
            qb.push(" AND ")
                .push_bind(category.clone())
                .push(" = ANY(categories)");
        }
        if let Some(min) = query.min_rating {
            qb.push(" AND rating >= ").push_bind(min);
        }
        if !query.exclude_ids.is_empty() {
            qb.push(" AND NOT (id = ANY(")
                .push_bind(query.exclude_ids.iter().copied().collect::<Vec<Uuid>>())
                .push("))");
        }
        qb.push(") w");
        if let (Some(_), Some(radius)) = (query.center, query.radius_km) {
            qb.push(" WHERE distance_km <= ").push_bind(radius);
        }
        qb.push(" LIMIT ").push_bind(MAX_SCAN as i64);

        let rows: Vec<WorkerDistanceRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| (Worker::from(r.worker), r.distance_km))
            .collect())
    }

    async fn find_worker_orders(
        &self,
        query: &WorkerOrderQuery,
    ) -> Result<Vec<(WorkerOrder, Option<f64>)>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM (SELECT ");
        qb.push(ORDER_COLUMNS).push(", ");
        push_nullable_distance(&mut qb, query.center);
        qb.push(" AS distance_km FROM worker_orders WHERE TRUE");
        if !query.statuses.is_empty() {
            let statuses: Vec<String> =
                query.statuses.iter().map(|s| s.as_str().to_string()).collect();
            qb.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if !query.categories.is_empty() {
            qb.push(" AND category = ANY(")
                .push_bind(query.categories.clone())
                .push(")");
        }
        if let Some(urgency) = query.urgency {
            qb.push(" AND urgency = ").push_bind(urgency.as_str());
        }
        qb.push(") o");
        if let (Some(_), Some(radius)) = (query.center, query.radius_km) {
            qb.push(" WHERE distance_km <= ").push_bind(radius);
        }
        qb.push(" LIMIT ").push_bind(MAX_SCAN as i64);

        let rows: Vec<OrderDistanceRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| Ok((WorkerOrder::try_from(r.order)?, r.distance_km)))
            .collect()
    }

    async fn responded_worker_ids(&self, order_id: Uuid) -> Result<HashSet<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT worker_id FROM worker_invitations WHERE order_id = $1 AND responded_at IS NOT NULL",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn responded_order_ids(&self, worker_id: Uuid) -> Result<HashSet<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT order_id FROM worker_invitations WHERE worker_id = $1 AND responded_at IS NOT NULL",
        )
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn worker_review_ratings(&self, worker_id: Uuid) -> Result<Vec<f64>, StoreError> {
        let ratings: Vec<f64> =
            sqlx::query_scalar("SELECT rating FROM worker_reviews WHERE worker_id = $1")
                .bind(worker_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ratings)
    }

    async fn worker_activity(&self, worker_id: Uuid) -> Result<WorkerActivity, StoreError> {
        let (completed_orders, active_orders): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'completed'),
                   COUNT(*) FILTER (WHERE status = 'in_progress')
            FROM worker_orders
            WHERE assigned_worker_id = $1
            "#,
        )
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await?;

        let (invitations, responded_invitations, avg_response_minutes): (i64, i64, Option<f64>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COUNT(responded_at),
                       AVG(EXTRACT(EPOCH FROM (responded_at - invited_at)) / 60.0)::float8
                FROM worker_invitations
                WHERE worker_id = $1
                "#,
            )
            .bind(worker_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(WorkerActivity {
            completed_orders,
            active_orders,
            invitations,
            responded_invitations,
            avg_response_minutes,
        })
    }

    async fn save_worker_stats(
        &self,
        worker_id: Uuid,
        stats: &WorkerStats,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE workers
            SET rating = $1, reviews_count = $2, response_rate = $3,
                avg_response_minutes = $4, completed_orders_count = $5,
                active_orders_count = $6
            WHERE id = $7
            "#,
        )
        .bind(stats.rating)
        .bind(stats.reviews_count)
        .bind(stats.response_rate)
        .bind(stats.avg_response_minutes)
        .bind(stats.completed_orders_count)
        .bind(stats.active_orders_count)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ad::AdFilter;

    #[test]
    fn test_escape_like_wraps_and_escapes() {
        assert_eq!(escape_like("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_ad_predicate_combines_category_and_keywords() {
        let query = AdQuery {
            filter: AdFilter {
                category_ids: vec!["garden".to_string()],
                ..AdFilter::default()
            },
            keywords: vec!["mow".to_string(), "plough".to_string()],
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM ads");
        push_ad_predicate(&mut qb, &query, &HashSet::new());
        let sql = qb.sql();
        assert!(sql.contains("category_id = ANY($1)"));
        assert!(sql.contains("AND (title ILIKE $2"));
        assert!(sql.contains(" OR title ILIKE $4"));
        assert!(!sql.contains("NOT (id"));
    }

    #[test]
    fn test_ad_predicate_excludes_seen_ids() {
        let mut exclude = HashSet::new();
        exclude.insert(Uuid::new_v4());
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM ads");
        push_ad_predicate(&mut qb, &AdQuery::default(), &exclude);
        assert!(qb.sql().contains("NOT (id = ANY($1))"));
    }
}
