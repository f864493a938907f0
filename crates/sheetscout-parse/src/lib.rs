//! Formula tokenizing and reference splitting for SheetScout.
//!
//! The tokenizer is a single forward pass over the formula text and never
//! evaluates anything. [`Reference::parse`] splits operand tokens into their
//! workbook, sheet and body parts.

pub mod reference;
pub mod tokenizer;

pub use reference::{Reference, ReferenceKind};
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};
