//! Display formatting helpers.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{
    format_amount, format_date, format_percent, format_phone, truncate_string, CURRENCY,
};
