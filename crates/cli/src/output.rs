//! Stdout JSON formatting helpers.
//!
//! Singleton results print pretty-printed; list outputs print one
//! compact JSON object per line, per §6's external-interface contract.

use serde::Serialize;

pub fn print_one<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => println!("{{\"error\":\"serialization failed: {e}\"}}"),
    }
}

pub fn print_many<T: Serialize>(values: &[T]) {
    for v in values {
        match serde_json::to_string(v) {
            Ok(s) => println!("{s}"),
            Err(e) => println!("{{\"error\":\"serialization failed: {e}\"}}"),
        }
    }
}
