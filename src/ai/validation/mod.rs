//! AI Response Validation
//!
//! Turns free-form completion text into a schema-conformant `ReviewResult`:
//! - Best-effort extraction of the embedded JSON object
//! - Strict structural validation (required fields, valid enums)
//!
//! ## Design Philosophy
//! - Extraction is heuristic, validation is the correctness guarantee
//! - Unusable output is a result with `ERROR` status, never an error

mod extract;
mod response;

pub use extract::extract_first_json_object;
pub use response::ResponseValidator;
