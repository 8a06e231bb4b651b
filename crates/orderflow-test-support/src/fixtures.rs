//! Order fixtures.

use chrono::{TimeZone, Utc};
use orderflow_core::order::{Delivery, Item, Order, Payment};

/// A line item with the given `chrt_id` and otherwise fixed values.
#[must_use]
pub fn item(chrt_id: i64) -> Item {
    Item {
        chrt_id,
        track_number: "WBILMTESTTRACK".to_owned(),
        price: 453,
        rid: format!("ab4219087a764ae0btest-{chrt_id}"),
        name: "Mascaras".to_owned(),
        sale: 30,
        size: "0".to_owned(),
        total_price: 317,
        nm_id: 2_389_212,
        brand: "Vivienne Sabo".to_owned(),
        status: 202,
    }
}

/// A fully populated order with two items, keyed by `order_uid`.
#[must_use]
pub fn sample_order(order_uid: &str) -> Order {
    Order {
        order_uid: order_uid.to_owned(),
        id: None,
        track_number: "WBILMTESTTRACK".to_owned(),
        entry: "WBIL".to_owned(),
        delivery: Delivery {
            name: "Test Testov".to_owned(),
            phone: "+9720000000".to_owned(),
            zip: "2639809".to_owned(),
            city: "Kiryat Mozkin".to_owned(),
            address: "Ploshad Mira 15".to_owned(),
            region: "Kraiot".to_owned(),
            email: "test@gmail.com".to_owned(),
        },
        payment: Payment {
            transaction: order_uid.to_owned(),
            request_id: String::new(),
            currency: "USD".to_owned(),
            provider: "wbpay".to_owned(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_owned(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![item(9_934_930), item(9_934_931)],
        locale: "en".to_owned(),
        internal_signature: String::new(),
        customer_id: "test".to_owned(),
        delivery_service: "meest".to_owned(),
        shardkey: "9".to_owned(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_owned(),
    }
}
