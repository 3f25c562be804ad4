pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod schema;

use diesel_async::pooled_connection::deadpool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection};
pub use error::DatabaseError;

pub type Pool = deadpool::Pool<AsyncPgConnection>;

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

pub fn get_database_connection(database_url: &str) -> Result<Pool, DatabaseError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}

/// A connection outside of the pool, for work that holds table locks.
pub async fn establish(database_url: &str) -> Result<AsyncPgConnection, DatabaseError> {
    Ok(AsyncPgConnection::establish(database_url).await?)
}
