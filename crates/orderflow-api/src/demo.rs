//! Synthetic orders for load and smoke testing.

use orderflow_core::clock::Clock;
use orderflow_core::order::{Delivery, Item, Order, Payment};
use orderflow_core::rng::DeterministicRng;
use uuid::Uuid;

/// Highest customer number a generated order may carry.
const MAX_CUSTOMER: u32 = 1000;
/// Highest payment amount, in minor units, a generated order may carry.
const MAX_AMOUNT: u32 = 10_000_000;

/// Builds a plausible order with a fresh business key, a random customer
/// and a random payment amount, stamped with the clock's current time.
#[must_use]
pub fn generate_order(clock: &dyn Clock, rng: &mut dyn DeterministicRng) -> Order {
    let now = clock.now();
    let unix = clock.unix_seconds();
    let customer = rng.next_u32_range(0, MAX_CUSTOMER);
    let amount = rng.next_u32_range(0, MAX_AMOUNT);

    Order {
        order_uid: Uuid::new_v4().to_string(),
        id: None,
        track_number: format!("WB{}", unix.rem_euclid(1_000_000)),
        entry: "WBIL".to_owned(),
        delivery: Delivery {
            name: "Ivan Petrov".to_owned(),
            phone: "+7 999 111-22-33".to_owned(),
            zip: "101000".to_owned(),
            city: "Moscow".to_owned(),
            address: "Tverskaya, 1".to_owned(),
            region: "Moscow".to_owned(),
            email: "ivan@example.com".to_owned(),
        },
        payment: Payment {
            transaction: format!("tr-{}", now.timestamp_nanos_opt().unwrap_or(unix)),
            request_id: String::new(),
            currency: "RUB".to_owned(),
            provider: "wbpay".to_owned(),
            amount: i64::from(amount),
            payment_dt: unix,
            bank: "alpha".to_owned(),
            delivery_cost: 200,
            goods_total: 9800,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 1,
            track_number: "WB123".to_owned(),
            price: 9800,
            rid: "ab-1".to_owned(),
            name: "T-shirt".to_owned(),
            sale: 0,
            size: "L".to_owned(),
            total_price: 9800,
            nm_id: 123,
            brand: "WB".to_owned(),
            status: 202,
        }],
        locale: "ru".to_owned(),
        internal_signature: String::new(),
        customer_id: format!("customer-{customer}"),
        delivery_service: "meest".to_owned(),
        shardkey: "0".to_owned(),
        sm_id: 0,
        date_created: now,
        oof_shard: "0".to_owned(),
    }
}
