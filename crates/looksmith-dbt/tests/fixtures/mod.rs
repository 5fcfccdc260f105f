//! Test fixtures for resolver and validator integration tests
//!
//! Builds small manifest/catalog documents around a `shop` project:
//! - `orders` (tagged `finance`) with a measure on `amount`
//! - `customers` (untagged) and `regions` (tagged `marketing`)
//! - a `sales` exposure centered on `orders` joining `customers`

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

pub const PROJECT: &str = "shop";

/// Route resolver logs to the test output (`RUST_LOG=looksmith_dbt=debug`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A model node with plain columns
pub fn model(name: &str, tags: &[&str], columns: &[&str]) -> Value {
    let columns: Map<String, Value> = columns
        .iter()
        .map(|column| {
            (
                column.to_string(),
                json!({"name": column, "description": "", "meta": {}}),
            )
        })
        .collect();

    json!({
        "unique_id": format!("model.{}.{}", PROJECT, name),
        "resource_type": "model",
        "relation_name": format!("\"analytics\".\"marts\".\"{}\"", name),
        "schema": "marts",
        "name": name,
        "description": format!("The {} model", name),
        "tags": tags,
        "columns": columns,
        "meta": {}
    })
}

/// An exposure with a main model and one join per `sql_on`
pub fn exposure(name: &str, tags: &[&str], main_model: &str, sql_on: &[&str]) -> Value {
    let joins: Vec<Value> = sql_on
        .iter()
        .enumerate()
        .map(|(index, sql_on)| {
            json!({
                "join": format!("join_{}", index),
                "type": "left_outer",
                "relationship": "many_to_one",
                "sql_on": sql_on
            })
        })
        .collect();

    json!({
        "unique_id": format!("exposure.{}.{}", PROJECT, name),
        "resource_type": "exposure",
        "name": name,
        "tags": tags,
        "original_file_path": format!("models/exposures/{}.yml", name),
        "meta": {"looker": {"main_model": main_model, "joins": joins}}
    })
}

/// A manifest document keyed by each node's unique_id
pub fn manifest(adapter: &str, nodes: Vec<Value>, exposures: Vec<Value>) -> Value {
    json!({
        "metadata": {"adapter_type": adapter, "dbt_version": "1.7.4"},
        "nodes": by_unique_id(nodes),
        "exposures": by_unique_id(exposures)
    })
}

fn by_unique_id(nodes: Vec<Value>) -> Map<String, Value> {
    nodes
        .into_iter()
        .map(|node| (node["unique_id"].as_str().unwrap_or_default().to_string(), node))
        .collect()
}

/// A catalog document: `(unique_id, [(column, type)])` per relation
pub fn catalog(entries: &[(&str, Vec<(&str, &str)>)]) -> Value {
    let nodes: Map<String, Value> = entries
        .iter()
        .map(|(unique_id, columns)| {
            let name = unique_id.rsplit('.').next().unwrap_or_default();
            let columns: Map<String, Value> = columns
                .iter()
                .enumerate()
                .map(|(index, (column, data_type))| {
                    (
                        column.to_string(),
                        json!({"type": data_type, "index": index + 1, "name": column, "comment": null}),
                    )
                })
                .collect();

            (
                unique_id.to_string(),
                json!({
                    "metadata": {"type": "BASE TABLE", "schema": "marts", "name": name, "comment": null, "owner": "dbt"},
                    "columns": columns,
                    "stats": {}
                }),
            )
        })
        .collect();

    json!({"metadata": {"dbt_version": "1.7.4"}, "nodes": nodes, "sources": {}, "errors": null})
}

pub fn orders() -> Value {
    let mut orders = model("orders", &["finance"], &["order_id", "customer_id", "amount", "ordered_at"]);
    orders["columns"]["amount"]["meta"] = json!({
        "measures": {
            "total_amount": {"type": "sum", "value_format_name": "usd"},
            "completed_amount": {"type": "sum", "filters": [{"status": "complete"}]}
        }
    });
    orders["meta"] = json!({"primary-key": "order_id"});
    orders
}

pub fn customers() -> Value {
    model("customers", &[], &["customer_id", "email"])
}

pub fn regions() -> Value {
    model("regions", &["marketing"], &["region_id", "name"])
}

pub fn sales_exposure() -> Value {
    exposure(
        "sales",
        &["finance"],
        "ref('orders')",
        &["${ref('orders').customer_id} = ${ref('customers').customer_id}"],
    )
}

pub fn shop_manifest() -> Value {
    manifest("postgres", vec![orders(), customers(), regions()], vec![sales_exposure()])
}

pub fn shop_catalog() -> Value {
    catalog(&[
        (
            "model.shop.orders",
            vec![
                ("ORDER_ID", "integer"),
                ("CUSTOMER_ID", "integer"),
                ("AMOUNT", "numeric(10,2)"),
                ("ORDERED_AT", "timestamp without time zone"),
            ],
        ),
        ("model.shop.customers", vec![("customer_id", "integer"), ("email", "character varying(256)")]),
        ("model.shop.regions", vec![("region_id", "integer"), ("name", "text")]),
    ])
}
