//! Cross-layer integration tests for MOSAIC live in this crate's
//! `tests/` directory; there is no library code here.
