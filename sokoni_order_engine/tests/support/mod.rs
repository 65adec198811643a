//! Shared plumbing for the engine integration tests: a throwaway SQLite database per test, plus a
//! store seeded with one admin, one customer, one rider and a two-product catalog.
#![allow(dead_code)]

use std::path::Path;

use log::*;
use sok_common::Cents;
use sokoni_order_engine::{
    db_types::{NewProduct, Product, Role, Roles, User},
    events::EventProducers,
    traits::CatalogManagement,
    AuthApi,
    OrderFlowApi,
    SqliteDatabase,
};
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await
}

pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("sokoni_test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn run_migrations(url: &str) -> SqliteDatabase {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

pub struct SeededStore {
    pub db: SqliteDatabase,
    pub admin: User,
    pub customer: User,
    pub rider: User,
    /// KSh 100 a bag
    pub sugar: Product,
    /// KSh 50 a loaf
    pub bread: Product,
}

impl SeededStore {
    /// An order flow API over this store with no event subscribers.
    pub fn flow(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), EventProducers::default())
    }
}

pub async fn seeded_store() -> SeededStore {
    let db = prepare_test_env(&random_db_path()).await;
    let auth = AuthApi::new(db.clone());
    let admin = new_user(&auth, "Amina", "+254700000001", Role::Admin).await;
    let customer = new_user(&auth, "Brian", "+254700000002", Role::Customer).await;
    let rider = new_user(&auth, "Wanjiru", "+254700000003", Role::Rider).await;
    let sugar = db.insert_product(NewProduct::new("Sugar 1kg", Cents::from_shillings(100))).await.expect("Error adding sugar");
    let bread = db.insert_product(NewProduct::new("Bread", Cents::from_shillings(50))).await.expect("Error adding bread");
    SeededStore { db, admin, customer, rider, sugar, bread }
}

async fn new_user(auth: &AuthApi<SqliteDatabase>, name: &str, phone: &str, role: Role) -> User {
    let user = auth.register_user(name.to_string(), phone.to_string(), "hunter2").await.expect("Error registering user");
    auth.assign_roles(user.id, &Roles::from(vec![role])).await.expect("Error assigning role");
    auth.fetch_user_by_id(user.id).await.expect("Error fetching user").expect("User just created is gone")
}
