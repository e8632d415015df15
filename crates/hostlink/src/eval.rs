// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Evaluation of literal expressions.
//!
//! The runtime has no compiler, so only a literal subset is understood:
//!
//! ```text
//! expr    := None | True | False | number | string | bytes | name
//!          | '(' ')' | '(' expr ',' [expr (',' expr)* [',']] ')' | '(' expr ')'
//!          | '[' [expr (',' expr)* [',']] ']'
//!          | '{' [expr ':' expr (',' expr ':' expr)* [',']] '}'
//! number  := ['-' | '+'] (decimal | 0x.. | 0o.. | 0b.. | float)
//! ```
//!
//! Names resolve in `locals`, then `globals`, then the builtins namespace.
//! Malformed input raises `ValueError`; unknown names raise `KeyError`.

use std::iter::Peekable;
use std::num::IntErrorKind;
use std::str::CharIndices;

use hostlink_rt::{err, interp, values};

use crate::error::{self, BuiltinError, Error, Result};
use crate::object::{Object, ToObject};
use crate::types::{Bytes, Dict, List, NoneObject, Tuple};

/// Evaluate `source` as a literal expression.
pub fn eval(source: &str, globals: Option<&Dict>, locals: Option<&Dict>) -> Result<Object> {
    let mut parser = Parser {
        src: source,
        chars: source.char_indices().peekable(),
        globals,
        locals: locals.or(globals),
    };
    let value = parser.expr()?;
    parser.skip_ws();
    match parser.chars.peek() {
        None => Ok(value),
        Some(&(at, _)) => Err(malformed(at, "trailing input")),
    }
}

fn malformed(at: usize, what: &str) -> Error {
    BuiltinError::Value(format!("malformed expression at offset {at}: {what}")).into()
}

struct Parser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    globals: Option<&'a Dict>,
    locals: Option<&'a Dict>,
}

impl Parser<'_> {
    fn pos(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(at, _)| at)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    fn eat(&mut self, want: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(want) {
            self.chars.next();
            return true;
        }
        false
    }

    fn expect(&mut self, want: char) -> Result<()> {
        if self.eat(want) {
            return Ok(());
        }
        let at = self.pos();
        Err(malformed(at, &format!("expected '{want}'")))
    }

    fn expr(&mut self) -> Result<Object> {
        self.skip_ws();
        let at = self.pos();
        match self.peek() {
            None => Err(malformed(at, "unexpected end of input")),
            Some('(') => {
                self.chars.next();
                self.tuple_or_group()
            }
            Some('[') => {
                self.chars.next();
                let list = List::new()?;
                for item in self.items(']')? {
                    list.append(item)?;
                }
                Ok(list.into_object())
            }
            Some('{') => {
                self.chars.next();
                self.dict()
            }
            Some('\'' | '"') => self.string(false),
            Some('b') if matches!(self.src[at + 1..].chars().next(), Some('\'' | '"')) => {
                self.chars.next();
                self.string(true)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.name(),
            Some(c) => Err(malformed(at, &format!("unexpected '{c}'"))),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn items(&mut self, close: char) -> Result<Vec<Object>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expr()?);
            if !self.eat(',') {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn tuple_or_group(&mut self) -> Result<Object> {
        if self.eat(')') {
            return Tuple::new().map(Tuple::into_object);
        }
        let first = self.expr()?;
        if self.eat(')') {
            return Ok(first);
        }
        self.expect(',')?;
        let mut items = vec![first];
        items.extend(self.items(')')?);
        Tuple::from_objects(&items).map(Tuple::into_object)
    }

    fn dict(&mut self) -> Result<Object> {
        let dict = Dict::new()?;
        while !self.eat('}') {
            let key = self.expr()?;
            self.expect(':')?;
            let value = self.expr()?;
            dict.set_item(&key, &value)?;
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        Ok(dict.into_object())
    }

    fn string(&mut self, bytes: bool) -> Result<Object> {
        let start = self.pos();
        let Some((_, quote)) = self.chars.next() else {
            return Err(malformed(start, "unexpected end of input"));
        };
        let mut text = String::new();
        loop {
            let Some((at, c)) = self.chars.next() else {
                return Err(malformed(start, "unterminated string"));
            };
            match c {
                c if c == quote => break,
                '\n' => return Err(malformed(at, "unterminated string")),
                '\\' => {
                    let Some((at, escaped)) = self.chars.next() else {
                        return Err(malformed(start, "unterminated string"));
                    };
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' | '\'' | '"' => escaped,
                        other => return Err(malformed(at, &format!("unknown escape '\\{other}'"))),
                    });
                }
                c => text.push(c),
            }
        }
        if !bytes {
            return text.as_str().to_object();
        }
        if !text.is_ascii() {
            return Err(malformed(start, "bytes can only contain ASCII characters"));
        }
        Bytes::new(text.as_bytes()).map(Bytes::into_object)
    }

    fn number(&mut self) -> Result<Object> {
        let start = self.pos();
        let negative = match self.peek() {
            Some('-') => {
                self.chars.next();
                true
            }
            Some('+') => {
                self.chars.next();
                false
            }
            _ => false,
        };
        let body_start = self.pos();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.'))
        {
            self.chars.next();
        }
        // Exponent signs belong to the literal.
        let src = self.src;
        while matches!(src[..self.pos()].chars().last(), Some('e' | 'E'))
            && matches!(self.peek(), Some('+' | '-'))
        {
            self.chars.next();
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.chars.next();
            }
        }
        let end = self.pos();
        let body = src[body_start..end].replace('_', "");
        if body.is_empty() {
            return Err(malformed(start, "expected a number"));
        }

        let radix = match body.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        let int = match radix {
            Some(radix) => Some(i64::from_str_radix(&body[2..], radix)),
            None if body.bytes().all(|b| b.is_ascii_digit()) => Some(body.parse::<i64>()),
            None => None,
        };
        match int {
            Some(Ok(v)) => (if negative { -v } else { v }).to_object(),
            Some(Err(e)) if *e.kind() == IntErrorKind::PosOverflow => {
                Err(malformed(start, "integer literal out of range"))
            }
            Some(Err(_)) => Err(malformed(start, "invalid integer literal")),
            None => match body.parse::<f64>() {
                Ok(v) if body.contains(|c: char| c.is_ascii_digit()) => {
                    (if negative { -v } else { v }).to_object()
                }
                _ => Err(malformed(start, "invalid number literal")),
            },
        }
    }

    fn name(&mut self) -> Result<Object> {
        let start = self.pos();
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.chars.next();
        }
        let (src, end) = (self.src, self.pos());
        let name = &src[start..end];
        match name {
            "None" => return Ok(NoneObject::new().into()),
            "True" => return true.to_object(),
            "False" => return false.to_object(),
            _ => {}
        }
        for scope in [self.locals, self.globals].into_iter().flatten() {
            if let Some(value) = scope.get_item(name)? {
                return Ok(value);
            }
        }
        if interp::is_initialized() {
            let found = values::dict_get_item_str(interp::builtins(), name);
            if !found.is_null() {
                return error::borrowed_ref(found);
            }
            if !err::occurred().is_null() {
                return Err(Error::fetch());
            }
        }
        Err(BuiltinError::Key(format!("name '{name}' is not defined")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectApi;
    use crate::Handle;
    use hostlink_rt::{builtin, gil, ops};

    fn eval_str(source: &str) -> Object {
        eval(source, None, None).unwrap()
    }

    #[test]
    fn test_scalars() {
        let _gil = gil::acquire();
        assert!(eval_str("None").is_none());
        assert!(eval_str(" True ").is(Handle::from_static(builtin().true_)));
        assert_eq!(ops::long_as_i64(eval_str("-1_000").ptr()), -1000);
        assert_eq!(ops::long_as_i64(eval_str("0xff").ptr()), 255);
        assert_eq!(ops::long_as_i64(eval_str("0b101").ptr()), 5);
        assert!(eval_str("2.5e-1").equal(0.25).unwrap());
        assert!(eval_str(r#""tab\there""#).equal("tab\there").unwrap());
        assert!(eval_str("'it\\'s'").equal("it's").unwrap());
        let bytes = Bytes::try_from_object(eval_str("b'raw'")).unwrap();
        assert_eq!(bytes.as_bytes(), b"raw");
    }

    #[test]
    fn test_containers() {
        let _gil = gil::acquire();
        assert_eq!(eval_str("()").len().unwrap(), 0);
        assert!(eval_str("(7)").equal(7i64).unwrap());
        let single = Tuple::try_from_object(eval_str("(7,)")).unwrap();
        assert_eq!(single.len(), 1);

        let list = List::try_from_object(eval_str("[1, 'two', [3.0], ]")).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.get(1).get().unwrap().equal("two").unwrap());

        let dict = Dict::try_from_object(eval_str("{'a': 1, 'b': (2, 3)}")).unwrap();
        assert_eq!(dict.len(), 2);
        assert!(dict.get_item("a").unwrap().unwrap().equal(1i64).unwrap());
    }

    #[test]
    fn test_names_resolve_locals_first() {
        let _gil = gil::acquire();
        let globals = Dict::new().unwrap();
        let locals = Dict::new().unwrap();
        globals.set_item("x", 1i64).unwrap();
        globals.set_item("y", 2i64).unwrap();
        locals.set_item("x", 10i64).unwrap();

        let pair = eval("[x, y]", Some(&globals), Some(&locals)).unwrap();
        let pair = List::try_from_object(pair).unwrap();
        assert!(pair.get(0).get().unwrap().equal(10i64).unwrap());
        assert!(pair.get(1).get().unwrap().equal(2i64).unwrap());

        // Locals default to globals.
        assert!(eval("x", Some(&globals), None).unwrap().equal(1i64).unwrap());

        let e = eval("missing", Some(&globals), None).unwrap_err();
        assert!(e.matches(Handle::from_static(builtin().key_error)));
        assert!(err::occurred().is_null());
    }

    #[test]
    fn test_malformed_input_raises_value_error() {
        let _gil = gil::acquire();
        for source in ["", "[1, 2", "'open", "1 2", "{1}", "0xzz", "b'\u{e9}'", "'\\q'", "@"] {
            let e = eval(source, None, None).unwrap_err();
            assert!(
                e.matches(Handle::from_static(builtin().value_error)),
                "{source:?}: {e}"
            );
        }
        let e = eval("99999999999999999999", None, None).unwrap_err();
        assert!(e.to_string().contains("out of range"), "{e}");
    }
}
