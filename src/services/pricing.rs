use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    models::{round_money, DeliverySettings, Order, ProfileLocation},
};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1_rad, lon1_rad) = (lat1.to_radians(), lon1.to_radians());
    let (lat2_rad, lon2_rad) = (lat2.to_radians(), lon2.to_radians());
    let dlat = lat2_rad - lat1_rad;
    let dlon = lon2_rad - lon1_rad;
    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    // rounding can push `a` a hair past 1 for antipodal points
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Quantity and optional per-unit weight of one line, all pricing needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeightedItem {
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_grams: Option<u32>,
}

/// Line-item breakdown of a delivery fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryQuote {
    #[schema(value_type = String)]
    pub distance_km: Decimal,
    pub total_weight_grams: u64,
    #[schema(value_type = String)]
    pub total_weight_kg: Decimal,
    #[schema(value_type = String)]
    pub base_price: Decimal,
    #[schema(value_type = String)]
    pub distance_price: Decimal,
    #[schema(value_type = String)]
    pub weight_price: Decimal,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

/// Delivery fee from the business origin to `(latitude, longitude)`.
///
/// `total = base + distanceKm * perKm + weightKg * perKg`, where each priced
/// component is rounded to cents before summation so the breakdown always
/// adds up to the charged total. Fails when the summed weight does not fit
/// in a `u64` gram count.
pub fn quote_delivery(
    settings: &DeliverySettings,
    latitude: f64,
    longitude: f64,
    items: &[WeightedItem],
) -> Result<DeliveryQuote, ServiceError> {
    let distance = haversine_km(
        settings.business_latitude,
        settings.business_longitude,
        latitude,
        longitude,
    );
    let distance_km = Decimal::from_f64(distance).unwrap_or_default();

    let total_weight_grams = items
        .iter()
        .try_fold(0u64, |total, item| {
            let grams = item
                .weight_grams
                .unwrap_or(settings.default_item_weight_grams);
            u64::from(grams)
                .checked_mul(u64::from(item.quantity))
                .and_then(|line| total.checked_add(line))
        })
        .ok_or_else(|| {
            ServiceError::ValidationError("total item weight is too large".to_string())
        })?;
    let total_weight_kg = Decimal::from(total_weight_grams) / Decimal::from(1000);

    let base_price = round_money(settings.delivery_base_price);
    let distance_price = round_money(distance_km * settings.delivery_price_per_km);
    let weight_price = round_money(total_weight_kg * settings.delivery_price_per_kg);

    Ok(DeliveryQuote {
        distance_km: round_money(distance_km),
        total_weight_grams,
        total_weight_kg: round_money(total_weight_kg),
        base_price,
        distance_price,
        weight_price,
        total_price: round_money(base_price + distance_price + weight_price),
    })
}

/// Items total plus, when the payer has a delivery location, the delivery fee.
/// An order without items is free regardless of location.
pub fn compute_order_total(
    order: &Order,
    settings: &DeliverySettings,
    location: Option<&ProfileLocation>,
) -> Result<Decimal, ServiceError> {
    if order.items.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let delivery_fee = match location {
        Some(loc) => {
            let weighted: Vec<WeightedItem> = order
                .items
                .iter()
                .map(|item| WeightedItem {
                    quantity: item.quantity,
                    weight_grams: item.weight_grams,
                })
                .collect();
            quote_delivery(settings, loc.latitude, loc.longitude, &weighted)?.total_price
        }
        None => Decimal::ZERO,
    };

    Ok(round_money(order.items_total() + delivery_fee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderItem, OrderStatus};
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn settings() -> DeliverySettings {
        DeliverySettings {
            business_latitude: -34.6037,
            business_longitude: -58.3816,
            default_item_weight_grams: 500,
            delivery_base_price: dec!(500),
            delivery_price_per_km: dec!(150),
            delivery_price_per_kg: dec!(100),
            ..Default::default()
        }
    }

    fn order(items: Vec<OrderItem>) -> Order {
        Order {
            id: Uuid::new_v4(),
            profile_id: None,
            user_id: Some("user-1".into()),
            status: OrderStatus::Created,
            status_message: None,
            eta: "30m".into(),
            items,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn haversine_is_zero_at_origin_and_symmetric() {
        assert_eq!(haversine_km(-34.6, -58.4, -34.6, -58.4), 0.0);
        let there = haversine_km(-34.6037, -58.3816, -34.9205, -57.9536);
        let back = haversine_km(-34.9205, -57.9536, -34.6037, -58.3816);
        assert!((there - back).abs() < 1e-9);
        // Buenos Aires to La Plata is roughly 52 km
        assert!((there - 52.0).abs() < 2.0);
    }

    #[test]
    fn quote_at_origin_is_base_plus_weight() {
        let quote = quote_delivery(
            &settings(),
            -34.6037,
            -58.3816,
            &[
                WeightedItem { quantity: 2, weight_grams: None },
                WeightedItem { quantity: 1, weight_grams: Some(1000) },
            ],
        )
        .unwrap();
        assert_eq!(quote.distance_km, dec!(0));
        assert_eq!(quote.total_weight_grams, 2000);
        assert_eq!(quote.total_weight_kg, dec!(2));
        assert_eq!(quote.weight_price, dec!(200));
        assert_eq!(quote.total_price, dec!(700));
    }

    #[test]
    fn breakdown_sums_to_total() {
        let quote = quote_delivery(
            &settings(),
            -34.58,
            -58.42,
            &[WeightedItem { quantity: 3, weight_grams: Some(333) }],
        )
        .unwrap();
        assert_eq!(
            quote.total_price,
            quote.base_price + quote.distance_price + quote.weight_price
        );
        assert!(quote.distance_km > Decimal::ZERO);
    }

    #[rstest]
    #[case(vec![], dec!(0))]
    #[case(vec![(dec!(1000), 2), (dec!(500), 1)], dec!(2500))]
    #[case(vec![(dec!(10.005), 1)], dec!(10.01))]
    fn total_without_location_is_items_only(
        #[case] lines: Vec<(Decimal, u32)>,
        #[case] expected: Decimal,
    ) {
        let items = lines
            .into_iter()
            .map(|(unit_price, quantity)| OrderItem {
                name: "item".into(),
                unit_price,
                quantity,
                weight_grams: None,
            })
            .collect();
        assert_eq!(
            compute_order_total(&order(items), &settings(), None).unwrap(),
            expected
        );
    }

    #[test]
    fn total_with_location_adds_delivery_fee() {
        let location = ProfileLocation {
            id: Uuid::new_v4(),
            latitude: -34.6037,
            longitude: -58.3816,
            address: "Av. de Mayo 500".into(),
        };
        let order = order(vec![OrderItem {
            name: "pizza".into(),
            unit_price: dec!(1000),
            quantity: 1,
            weight_grams: Some(1000),
        }]);
        // 1000 items + 500 base + 0 distance + 1 kg * 100
        assert_eq!(
            compute_order_total(&order, &settings(), Some(&location)).unwrap(),
            dec!(1600)
        );
    }

    #[test]
    fn oversized_weight_is_rejected_instead_of_overflowing() {
        let heavy = WeightedItem {
            quantity: u32::MAX,
            weight_grams: Some(u32::MAX),
        };
        let result = quote_delivery(&settings(), -34.6037, -58.3816, &[heavy, heavy]);
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));

        // a single maximal line still fits
        let quote = quote_delivery(&settings(), -34.6037, -58.3816, &[heavy]).unwrap();
        assert_eq!(
            quote.total_weight_grams,
            u64::from(u32::MAX) * u64::from(u32::MAX)
        );
    }

    #[test]
    fn order_total_surfaces_weight_overflow() {
        let location = ProfileLocation {
            id: Uuid::new_v4(),
            latitude: -34.6037,
            longitude: -58.3816,
            address: "Av. de Mayo 500".into(),
        };
        let line = OrderItem {
            name: "anvil".into(),
            unit_price: dec!(1),
            quantity: u32::MAX,
            weight_grams: Some(u32::MAX),
        };
        let order = order(vec![line.clone(), line]);
        assert!(compute_order_total(&order, &settings(), Some(&location)).is_err());
    }
}
