use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Entity;
use super::errors::ProductError;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
/// 1,000,000.00
pub const MAX_PRICE: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 2);

/// Running average of submitted ratings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub average: f64,
    pub count: u64,
}

impl Rating {
    /// Fold one rating into the average: `(a*c + r) / (c+1)`
    pub fn record(&mut self, value: i64) -> Result<(), ProductError> {
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            return Err(ProductError::InvalidRating(value));
        }

        let count = self.count as f64;
        self.average = (self.average * count + value as f64) / (count + 1.0);
        self.count += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub version: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub active: bool,
    pub rating: Rating,
    /// Stock or downloadable asset delivered on fulfillment
    pub asset_url: Option<String>,
    pub image_url: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable catalog fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub active: Option<bool>,
    pub asset_url: Option<String>,
}

impl Product {
    pub fn new(
        owner_id: Uuid,
        name: String,
        description: String,
        price: Decimal,
        category: String,
        asset_url: Option<String>,
    ) -> Result<Self, ProductError> {
        let now = Utc::now();
        let product = Self {
            id: Uuid::new_v4(),
            version: 0,
            name: name.trim().to_string(),
            description,
            price,
            category: category.trim().to_string(),
            active: true,
            rating: Rating::default(),
            asset_url,
            image_url: None,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        product.validate()?;
        Ok(product)
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.is_empty() {
            return Err(ProductError::EmptyName);
        }
        if self.category.is_empty() {
            return Err(ProductError::EmptyCategory);
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(ProductError::NegativePrice);
        }
        if self.price > MAX_PRICE {
            return Err(ProductError::PriceTooHigh);
        }
        Ok(())
    }

    pub fn apply_changes(&mut self, changes: ProductChanges) -> Result<(), ProductError> {
        let mut updated = self.clone();
        if let Some(name) = changes.name {
            updated.name = name.trim().to_string();
        }
        if let Some(description) = changes.description {
            updated.description = description;
        }
        if let Some(price) = changes.price {
            updated.price = price;
        }
        if let Some(category) = changes.category {
            updated.category = category.trim().to_string();
        }
        if let Some(active) = changes.active {
            updated.active = active;
        }
        if let Some(asset_url) = changes.asset_url {
            updated.asset_url = Some(asset_url);
        }

        updated.validate()?;
        updated.updated_at = Utc::now();
        *self = updated;
        Ok(())
    }

    pub fn ensure_purchasable(&self) -> Result<(), ProductError> {
        if self.active {
            Ok(())
        } else {
            Err(ProductError::Inactive)
        }
    }
}

impl Entity for Product {
    const COLLECTION: &'static str = "products";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
