pub mod artwork_service;
pub mod authenticator;
pub mod credential_store;
pub mod file_store;
pub mod password;
pub mod session;
