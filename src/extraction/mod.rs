//! Extraction clients
//!
//! Turn raw chat text into a typed record through the completion service.
//! Extraction never fails outward: any service, parse or schema problem
//! yields the domain's fallback record wrapped in `Extraction::Fallback`.

use crate::error::AssistantError;
use crate::gemini::strip_code_fence;
use serde_json::Value;

pub mod finance;
pub mod memory;

pub use finance::FinanceExtractor;
pub use memory::MemoryExtractor;

/// Decoding temperature for structured extraction
pub const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Parse the completion text as a JSON payload.
fn parse_payload(response: &str) -> crate::Result<Value> {
    let cleaned = strip_code_fence(response);

    serde_json::from_str(cleaned).map_err(|e| {
        AssistantError::ValidationFailure(format!(
            "completion is not valid JSON: {} | raw={}",
            e, response
        ))
    })
}
