//! End-to-end scenario tests for the demarc transaction runtime
//!
//! The tests in `tests/` drive the engine exclusively through the public API
//! of `demarc-engine`, `demarc-context` and `demarc-core`, the way embedding
//! code would: obtain scopes, register synchronizations, bind resources, and
//! assert the externally observable traces.
