//! Typed response tree for the homes query.
//!
//! Mirrors the subset of the Tibber GraphQL schema the exporter requests.
//! Nullable upstream fields are `Option`s so a home without a subscription or
//! an hour without a measurement still deserializes.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

/// The `data` object of a homes query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryData {
    pub viewer: Viewer,
}

/// The authenticated API user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewer {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub homes: Vec<Home>,
}

/// A home registered to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    pub id: String,

    /// IANA time zone name (e.g. "Europe/Oslo").
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_zone: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub address: Address,

    #[serde(default)]
    pub owner: Option<Owner>,

    #[serde(default)]
    pub current_subscription: Option<Subscription>,

    #[serde(default)]
    pub consumption: Option<Consumption>,
}

impl Home {
    /// The current price snapshot, if the home has an active subscription.
    pub fn current_price(&self) -> Option<&Price> {
        self.current_subscription
            .as_ref()
            .and_then(|s| s.price_info.as_ref())
            .and_then(|p| p.current.as_ref())
    }

    /// Consumption records in response order, most recent first.
    pub fn consumption_nodes(&self) -> &[ConsumptionNode] {
        self.consumption
            .as_ref()
            .map(|c| c.nodes.as_slice())
            .unwrap_or_default()
    }
}

/// Postal address and coordinates of a home.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address1: String,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub address3: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub latitude: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub longitude: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub contact_info: Option<ContactInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub price_info: Option<PriceInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    #[serde(default)]
    pub current: Option<Price>,
}

/// Price snapshot for the current hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Energy plus tax.
    pub total: f64,
    /// Nordpool spot price.
    pub energy: f64,
    /// Taxes and fees.
    pub tax: f64,
    pub currency: String,
    pub starts_at: DateTime<FixedOffset>,
    /// Price level relative to the trailing average ("CHEAP", "NORMAL", ...).
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<ConsumptionNode>,
}

/// One hourly usage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionNode {
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub unit_cost: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default, rename = "unitPriceVAT")]
    pub unit_price_vat: Option<f64>,
    /// Null while the hour has not been metered yet.
    #[serde(default)]
    pub consumption: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consumption_unit: String,
    #[serde(default)]
    pub currency: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
