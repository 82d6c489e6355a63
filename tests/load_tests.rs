//! Load Test Runner
//!
//! Load tests are marked `#[ignore]`; run them explicitly:
//! ```bash
//! cargo test --test load_tests -- --ignored --test-threads=1
//! ```

mod load;
