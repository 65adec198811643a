mod cents;

pub mod op;

mod helpers;

pub use cents::{Cents, CentsConversionError, KES_CURRENCY_CODE, KES_CURRENCY_CODE_LOWER};
pub use helpers::parse_boolean_flag;
