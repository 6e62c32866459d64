//! Trace readers.
//!
//! Two ASCII trace forms are understood, one reference per line:
//!
//! - **Memory trace:** `<addr> R|W`. The address accepts C-style base
//!   prefixes (`0x` hex, leading `0` octal, decimal otherwise). An
//!   address too large for 64 bits degrades the line to address 0 READ;
//!   a missing kind token defaults to READ.
//! - **CPU trace:** `<eip> EXE`, `<eip> LOAD <addr>`, or
//!   `<eip> STORE <addr>`, producing [`Instruction`] records.
//!
//! Any other malformation fails at startup with a trace-format error.

use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::common::request::AccessKind;
use crate::common::{Addr, SimError};

/// Operation of one CPU-trace instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Memory load; occupies a window slot until its fill returns.
    Load,
    /// Memory store; retires eagerly once the cache accepts it.
    Store,
    /// Non-memory instruction.
    Exe,
}

/// One CPU-trace record.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    /// Instruction pointer.
    pub eip: Addr,
    /// Operation kind.
    pub op: Operation,
    /// Target address for loads and stores; zero for EXE.
    pub target_addr: Addr,
}

/// What a trace file contains, detected from its first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    /// `<addr> R|W` lines.
    Memory,
    /// `<eip> EXE|LOAD|STORE [<addr>]` lines.
    Cpu,
}

/// Line reader over one trace file.
pub struct Trace {
    reader: BufReader<File>,
    path: String,
    line_no: usize,
}

/// How one address token parsed.
enum ParsedAddr {
    Value(Addr),
    /// Parsed as a number but wider than 64 bits.
    Overflow,
}

/// Parses an integer with C-style base prefixes.
fn parse_c_addr(path: &str, line: usize, token: &str) -> Result<ParsedAddr, SimError> {
    let (digits, radix) = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        (hex, 16)
    } else if token.len() > 1 && token.starts_with('0') {
        (&token[1..], 8)
    } else {
        (token, 10)
    };

    match u128::from_str_radix(digits, radix) {
        Ok(v) if v > u128::from(Addr::MAX) => Ok(ParsedAddr::Overflow),
        Ok(v) => Ok(ParsedAddr::Value(v as Addr)),
        Err(_) => Err(SimError::trace(
            path,
            line,
            format!("bad address token `{token}`"),
        )),
    }
}

impl Trace {
    /// Opens a trace file.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Io`] when the file cannot be opened.
    pub fn open(path: &str) -> Result<Self, SimError> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_string(),
            line_no: 0,
        })
    }

    /// Detects whether a trace file holds memory references or CPU
    /// instructions, from its first non-empty line.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Io`] when the file cannot be read, or
    /// [`SimError::TraceFormat`] when it is empty.
    pub fn detect_kind(path: &str) -> Result<TraceKind, SimError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let Some(_first) = tokens.next() else {
                continue;
            };
            return Ok(match tokens.next() {
                Some("EXE" | "LOAD" | "STORE") => TraceKind::Cpu,
                _ => TraceKind::Memory,
            });
        }
        Err(SimError::trace(path, 0, "empty trace file"))
    }

    fn next_line(&mut self) -> Result<Option<String>, SimError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
    }

    /// Reads the next memory reference, or `None` at end of trace.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TraceFormat`] for unparseable lines.
    pub fn next_memtrace_request(&mut self) -> Result<Option<(Addr, AccessKind)>, SimError> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let mut tokens = line.split_whitespace();
        let addr_tok = tokens
            .next()
            .ok_or_else(|| SimError::trace(&self.path, self.line_no, "missing address"))?;

        let addr = match parse_c_addr(&self.path, self.line_no, addr_tok)? {
            // An overflowed address degrades the whole line.
            ParsedAddr::Overflow => return Ok(Some((0, AccessKind::Read))),
            ParsedAddr::Value(v) => v,
        };

        let kind = match tokens.next() {
            Some(t) if t.starts_with('R') => AccessKind::Read,
            Some(t) if t.starts_with('W') => AccessKind::Write,
            // A missing kind token defaults to a read.
            None => AccessKind::Read,
            Some(t) => {
                return Err(SimError::trace(
                    &self.path,
                    self.line_no,
                    format!("bad access kind `{t}`"),
                ));
            }
        };

        Ok(Some((addr, kind)))
    }

    /// Reads the next CPU instruction record, or `None` at end of trace.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::TraceFormat`] for unparseable lines.
    pub fn next_instruction(&mut self) -> Result<Option<Instruction>, SimError> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let mut tokens = line.split_whitespace();
        let eip_tok = tokens
            .next()
            .ok_or_else(|| SimError::trace(&self.path, self.line_no, "missing eip"))?;
        let eip = match parse_c_addr(&self.path, self.line_no, eip_tok)? {
            ParsedAddr::Overflow => 0,
            ParsedAddr::Value(v) => v,
        };

        let op = match tokens.next() {
            Some("EXE") => {
                return Ok(Some(Instruction {
                    eip,
                    op: Operation::Exe,
                    target_addr: 0,
                }));
            }
            Some("LOAD") => Operation::Load,
            Some("STORE") => Operation::Store,
            other => {
                return Err(SimError::trace(
                    &self.path,
                    self.line_no,
                    format!("bad operation token `{other:?}`"),
                ));
            }
        };

        let addr_tok = tokens
            .next()
            .ok_or_else(|| SimError::trace(&self.path, self.line_no, "missing target address"))?;
        let target_addr = match parse_c_addr(&self.path, self.line_no, addr_tok)? {
            ParsedAddr::Overflow => 0,
            ParsedAddr::Value(v) => v,
        };

        Ok(Some(Instruction {
            eip,
            op,
            target_addr,
        }))
    }
}
