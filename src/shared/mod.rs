pub mod ids;

pub use ids::{generate_field_key, generate_id, now_millis};
