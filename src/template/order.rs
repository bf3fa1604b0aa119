use serde_json::{Value, json};

use crate::args::RandomField;

pub const DEFAULT_ORDER_URL: &str = "http://localhost:8082/orders";

const QUANTITY_MIN: i64 = 1;
const QUANTITY_MAX: i64 = 5;

/// Order-creation payload with a random quantity per product line.
#[must_use]
pub fn order_body() -> Value {
    json!({
        "user_id": 1,
        "product_requests": [
            {
                "product_id": 101,
                "quantity": "{{quantity_1}}",
                "mark_up": 10.0,
                "discount": 5.0,
                "final_price": 95.0
            },
            {
                "product_id": 102,
                "quantity": "{{quantity_2}}",
                "mark_up": 15.0,
                "discount": 3.0,
                "final_price": 112.0
            }
        ],
        "quantity": 3,
        "total": 207.0,
        "total_mark_up": 25.0,
        "total_discount": 8.0,
        "status": "created"
    })
}

#[must_use]
pub fn order_random_fields() -> Vec<RandomField> {
    ["quantity_1", "quantity_2"]
        .into_iter()
        .map(|name| RandomField {
            name: name.to_owned(),
            min: QUANTITY_MIN,
            max: QUANTITY_MAX,
        })
        .collect()
}
