pub mod cookies;
pub mod form;
pub mod secret_store;
pub mod session;
