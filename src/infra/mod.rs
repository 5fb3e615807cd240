pub mod assistant_client;
pub mod http_geocoder;
pub mod json_registry;
pub mod memory_registry;
