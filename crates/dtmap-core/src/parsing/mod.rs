pub mod response;
pub mod similarity;

pub use response::{extract_json_object, parse_oracle_json, strip_code_fences};
pub use similarity::{close_match, ratio};
