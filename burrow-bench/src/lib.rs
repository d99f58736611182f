//! Benchmark harness crate for burrow; see `benches/`.
