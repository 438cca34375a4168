#![allow(dead_code)]

use repobase_core::{Entity, RepoConfig, SqliteRepository};
use rusqlite::types::Value;
use rusqlite::Row;
use std::path::Path;
use uuid::Uuid;

pub const SCHEMA: &str = "
CREATE TABLE customers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    city TEXT,
    credit INTEGER NOT NULL CHECK (credit >= 0)
);
CREATE TABLE orders (
    id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL REFERENCES customers(id),
    total REAL NOT NULL
);
";

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub credit: i64,
}

impl Customer {
    pub fn new(name: &str, city: Option<&str>, credit: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            city: city.map(str::to_string),
            credit,
        }
    }
}

impl Entity for Customer {
    const TABLE: &'static str = "customers";
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &["id", "name", "city", "credit"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(self.name.clone()),
            Value::from(self.city.clone()),
            Value::Integer(self.credit),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            city: row.get("city")?,
            credit: row.get("credit")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub total: f64,
}

impl Order {
    pub fn for_customer(customer: &Customer, total: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            customer_id: customer.id.clone(),
            total,
        }
    }
}

impl Entity for Order {
    const TABLE: &'static str = "orders";
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &["id", "customer_id", "total"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(self.customer_id.clone()),
            Value::Real(self.total),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            customer_id: row.get("customer_id")?,
            total: row.get("total")?,
        })
    }
}

/// In-memory repository with the test schema applied.
pub fn customer_repo() -> SqliteRepository<Customer> {
    let repo = SqliteRepository::<Customer>::open_in_memory().unwrap();
    repo.context().connection().execute_batch(SCHEMA).unwrap();
    repo
}

/// File-backed repository; the schema is created when missing.
pub fn file_repo(path: &Path) -> SqliteRepository<Customer> {
    let repo = SqliteRepository::<Customer>::open(&RepoConfig::file(path)).unwrap();
    repo.context()
        .connection()
        .execute_batch(&SCHEMA.replace("CREATE TABLE", "CREATE TABLE IF NOT EXISTS"))
        .unwrap();
    repo
}

/// Saves `count` customers named `c001..` with credit equal to their number.
pub fn seed_customers(repo: &mut SqliteRepository<Customer>, count: i64) -> Vec<Customer> {
    use repobase_core::Repository;

    let customers = (1..=count)
        .map(|n| {
            let city = if n % 2 == 0 { "Lyon" } else { "Oslo" };
            Customer::new(&format!("c{n:03}"), Some(city), n)
        })
        .collect::<Vec<_>>();
    repo.save_list(&customers).unwrap();
    customers
}
