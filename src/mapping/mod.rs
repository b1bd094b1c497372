//! Terminal input mapping
//! Key presses become arm actions or edits of the console input line.

pub mod keyboard;
