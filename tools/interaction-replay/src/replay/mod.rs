//! Replay of recorded UI interaction logs.
//!
//! # Overview
//!
//! A recording is a JSONL file with one interaction event per line. Replay
//! walks it in file order and turns each event into a concrete operation:
//! 1. **Skip rules** drop events that should never be re-played
//! 2. **Routes** map opaque ids to named application operations
//! 3. **Handlers** cover the known `(event, action)` pairs, with
//!    recognizers and the context tracker filling in the active query card
//! 4. **Generic fallbacks** click or set values through the driver directly
//!
//! Everything below talks to the application through the `driver` ports, so
//! the whole engine runs against `FakeBrowser` in tests.

pub mod context;
pub mod dispatch;
pub mod locator;
pub mod log_reader;
pub mod recognizers;
pub mod replayer;
pub mod routes;
pub mod rules;
pub mod step;
