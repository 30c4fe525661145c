//! Barrel catalog model for ordering-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Wood the barrel is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WoodType {
    Oak,
    Chestnut,
    Acacia,
    Cherry,
    Ash,
    Other,
}

impl WoodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WoodType::Oak => "oak",
            WoodType::Chestnut => "chestnut",
            WoodType::Acacia => "acacia",
            WoodType::Cherry => "cherry",
            WoodType::Ash => "ash",
            WoodType::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "oak" => WoodType::Oak,
            "chestnut" => WoodType::Chestnut,
            "acacia" => WoodType::Acacia,
            "cherry" => WoodType::Cherry,
            "ash" => WoodType::Ash,
            _ => WoodType::Other,
        }
    }
}

/// What the barrel previously held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousContent {
    RedWine,
    WhiteWine,
    RoseWine,
    Champagne,
    Cognac,
    Whiskey,
    Rum,
    Other,
}

impl PreviousContent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviousContent::RedWine => "red_wine",
            PreviousContent::WhiteWine => "white_wine",
            PreviousContent::RoseWine => "rose_wine",
            PreviousContent::Champagne => "champagne",
            PreviousContent::Cognac => "cognac",
            PreviousContent::Whiskey => "whiskey",
            PreviousContent::Rum => "rum",
            PreviousContent::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "red_wine" => PreviousContent::RedWine,
            "white_wine" => PreviousContent::WhiteWine,
            "rose_wine" => PreviousContent::RoseWine,
            "champagne" => PreviousContent::Champagne,
            "cognac" => PreviousContent::Cognac,
            "whiskey" => PreviousContent::Whiskey,
            "rum" => PreviousContent::Rum,
            _ => PreviousContent::Other,
        }
    }
}

/// Physical condition grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrelCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

impl BarrelCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrelCondition::Excellent => "excellent",
            BarrelCondition::Good => "good",
            BarrelCondition::Fair => "fair",
            BarrelCondition::Poor => "poor",
            BarrelCondition::Damaged => "damaged",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "excellent" => BarrelCondition::Excellent,
            "fair" => BarrelCondition::Fair,
            "poor" => BarrelCondition::Poor,
            "damaged" => BarrelCondition::Damaged,
            _ => BarrelCondition::Good,
        }
    }
}

/// Catalog barrel with live stock count.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Barrel {
    pub barrel_id: Uuid,
    pub name: String,
    pub wood_type: String,
    pub previous_content: String,
    pub condition: String,
    pub volume_liters: Decimal,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Barrel {
    pub fn wood_type(&self) -> WoodType {
        WoodType::from_string(&self.wood_type)
    }

    pub fn previous_content(&self) -> PreviousContent {
        PreviousContent::from_string(&self.previous_content)
    }

    pub fn condition(&self) -> BarrelCondition {
        BarrelCondition::from_string(&self.condition)
    }
}
