pub mod api_types;
pub mod cached_client;
pub mod categories;
pub mod client;
pub mod payees;
pub mod transactions;
pub mod types;
