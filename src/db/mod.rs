//! Storage: schema initialization and the ticket CRUD layer.

pub mod schema;
pub mod store;
