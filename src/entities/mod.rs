// sea-orm table definitions; domain conversions live next to each model
pub mod order;
pub mod order_item;
pub mod order_token;
pub mod profile;
pub mod profile_location;
pub mod settings;
pub mod transaction;
