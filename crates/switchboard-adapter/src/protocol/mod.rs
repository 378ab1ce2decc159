//! Wire format types for the two protocols the adapter bridges
//!
//! Pure serde structs matching each API's JSON format. Request types are
//! lenient on input so unknown client fields do not fail a request.

pub mod anthropic;
pub mod openai;
