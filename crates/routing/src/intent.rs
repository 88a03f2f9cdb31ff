use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Coarse label attached to an inbound message for analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProductInquiry,
    Order,
    OrderStatus,
    PromoInquiry,
    Location,
    BusinessHours,
    General,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductInquiry => "product_inquiry",
            Self::Order => "order",
            Self::OrderStatus => "order_status",
            Self::PromoInquiry => "promo_inquiry",
            Self::Location => "location",
            Self::BusinessHours => "business_hours",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RULES
            .iter()
            .map(|(intent, _)| *intent)
            .chain([Self::General])
            .find(|i| i.as_str() == s)
            .ok_or_else(|| Error::UnknownIntent(s.to_string()))
    }
}

/// Rules in priority order. Keywords are lowercase.
///
/// A bare "berapa" is not a price keyword: it is the generic "how much / what
/// time" interrogative and would shadow every later rule ("jam buka berapa").
pub const RULES: &[(Intent, &[&str])] = &[
    (Intent::ProductInquiry, &["harga"]),
    (Intent::Order, &["pesan", "beli", "order"]),
    (Intent::OrderStatus, &["status", "pesanan saya"]),
    (Intent::PromoInquiry, &["promo", "diskon"]),
    (Intent::Location, &["lokasi", "alamat"]),
    (Intent::BusinessHours, &["jam", "buka"]),
];

/// Classify `text` by case-insensitive substring match. First rule wins.
#[must_use]
pub fn classify(text: &str) -> Intent {
    let lower = text.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(Intent::General, |(intent, _)| *intent)
}
