//! Shared winnow-based parsing utilities for the binary and text readers.

use winnow::Parser;
use winnow::ascii::{dec_int, float, line_ending, space1, till_line_ending};
use winnow::binary::{le_f32, le_i32, le_u8, length_take};
use winnow::combinator::{preceded, terminated};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::token::literal;

use crate::export::h3d::Field;

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, ErrMode<ContextError>>;

/// Kind of each number inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
}

/// A hard failure labelled with `what`, for values that parse but are not
/// acceptable.
pub fn invalid(what: &'static str) -> ErrMode<ContextError> {
    let mut err = ContextError::new();
    err.push(StrContext::Label(what));
    ErrMode::Cut(err)
}

/// Length-prefixed string: one unsigned length byte, then that many bytes.
pub fn parse_short_string(input: &mut &[u8]) -> WResult<String> {
    length_take(le_u8)
        .map(|bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned())
        .context(StrContext::Label("string"))
        .parse_next(input)
}

pub fn parse_binary_field(kind: FieldKind, input: &mut &[u8]) -> WResult<Field> {
    match kind {
        FieldKind::Int => le_i32.map(Field::Int).parse_next(input),
        FieldKind::Float => le_f32.map(Field::Float).parse_next(input),
    }
}

/// One full line, without its terminator.
pub fn parse_line<'a>(input: &mut &'a str) -> WResult<&'a str> {
    terminated(till_line_ending, line_ending)
        .context(StrContext::Label("line"))
        .parse_next(input)
}

/// A line holding a single signed integer.
pub fn parse_int_line(input: &mut &str) -> WResult<i32> {
    terminated(dec_int, line_ending)
        .context(StrContext::Label("integer line"))
        .parse_next(input)
}

/// The leading tag of a text record.
pub fn parse_tag(tag: &'static str, input: &mut &str) -> WResult<()> {
    literal(tag).void().parse_next(input)
}

pub fn parse_line_end(input: &mut &str) -> WResult<()> {
    line_ending.void().parse_next(input)
}

pub fn parse_text_field(kind: FieldKind, input: &mut &str) -> WResult<Field> {
    match kind {
        FieldKind::Int => preceded(space1, dec_int).map(Field::Int).parse_next(input),
        FieldKind::Float => preceded(space1, float).map(Field::Float).parse_next(input),
    }
}
