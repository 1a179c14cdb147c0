mod luhn;

pub use luhn::{is_valid_order_number, luhn_check_digit};
