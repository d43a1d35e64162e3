use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// A service provider in the "hire a worker" vertical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: Uuid,
    pub name: String,
    pub categories: Vec<String>,
    pub location: Option<GeoPoint>,
    pub rating: f64, // 0 – 5
    pub reviews_count: i64,
    pub completed_orders_count: i64,
    pub active_orders_count: i64,
    pub response_rate: f64, // 0 – 100
    pub avg_response_minutes: Option<f64>,
    pub experience_years: f64,
    pub is_verified: bool,
    pub is_pro: bool,
    pub is_team: bool,
    pub is_active: bool,
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Open => "open",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(OrderStatus::Draft),
            "open" => Ok(OrderStatus::Open),
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "expired" => Ok(OrderStatus::Expired),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
        }
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "urgent" => Ok(Urgency::Urgent),
            other => Err(format!("unknown urgency '{other}'")),
        }
    }
}

/// A customer's request for a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub title: String,
    pub category: String,
    pub location: Option<GeoPoint>,
    pub status: OrderStatus,
    pub urgency: Urgency,
    pub budget_from: Option<f64>,
    pub budget_to: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Order-side facts about one worker, aggregated from order and invitation records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerActivity {
    pub completed_orders: i64,
    pub active_orders: i64,
    pub invitations: i64,
    pub responded_invitations: i64,
    pub avg_response_minutes: Option<f64>,
}

/// Reputation fields recomputed from source records and persisted on the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    pub rating: f64,
    pub reviews_count: i64,
    pub response_rate: f64,
    pub avg_response_minutes: Option<f64>,
    pub completed_orders_count: i64,
    pub active_orders_count: i64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn worker(category: &str, location: Option<GeoPoint>) -> Worker {
        Worker {
            id: Uuid::new_v4(),
            name: "Worker".to_string(),
            categories: vec![category.to_string()],
            location,
            rating: 0.0,
            reviews_count: 0,
            completed_orders_count: 0,
            active_orders_count: 0,
            response_rate: 0.0,
            avg_response_minutes: None,
            experience_years: 0.0,
            is_verified: false,
            is_pro: false,
            is_team: false,
            is_active: true,
            last_active_at: None,
        }
    }

    pub fn order(category: &str, location: Option<GeoPoint>) -> WorkerOrder {
        WorkerOrder {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            title: "Order".to_string(),
            category: category.to_string(),
            location,
            status: OrderStatus::Open,
            urgency: Urgency::Normal,
            budget_from: None,
            budget_to: None,
            created_at: chrono::Utc::now(),
        }
    }
}
