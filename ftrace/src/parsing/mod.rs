//! Trace stream decoding: line grammars, per-event strategies and the
//! incremental line parser.

pub mod grammar;
pub mod line_parser;
pub mod strategies;

pub use line_parser::{Anomaly, Ingested, LineParser, ParserStats};
pub use strategies::{ForkStrategy, LineStrategy, SocketAddressStrategy, StandardStrategy};
