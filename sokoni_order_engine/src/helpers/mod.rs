mod order_ref;
mod passwords;
mod totals;

pub use order_ref::extract_order_id_from_reference;
pub use passwords::{hash_password, verify_password};
pub use totals::calculate_order_total;
