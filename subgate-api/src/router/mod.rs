pub mod admin;
pub mod proxy;
pub mod router;
pub mod status;
