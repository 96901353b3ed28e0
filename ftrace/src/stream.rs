//! Pull-based event stream over a line source
//!
//! Wraps any [`BufRead`] (normally `trace_pipe`) and a [`LineParser`]. Each
//! `next()` blocks on the source until one event decodes. The source is
//! consumed as it is read; there is no rewind. End of input ends the stream.

use std::io::BufRead;

use crate::domain::StreamError;
use crate::event::ParsedEvent;
use crate::parsing::{Ingested, LineParser, ParserStats};

pub struct EventStream<R> {
    reader: R,
    parser: LineParser,
    line: Vec<u8>,
}

impl<R: BufRead> EventStream<R> {
    pub fn new(reader: R, parser: LineParser) -> Self {
        Self { reader, parser, line: Vec::new() }
    }

    #[must_use]
    pub fn stats(&self) -> ParserStats {
        self.parser.stats
    }

    pub fn into_parser(self) -> LineParser {
        self.parser
    }
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = Result<ParsedEvent, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e.into())),
            }

            match self.parser.ingest(&self.line) {
                Ok(Ingested::Event(event)) => return Some(Ok(event)),
                Ok(Ingested::Incomplete | Ingested::Discarded(_)) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
