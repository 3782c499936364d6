// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`serde_json::ser::Formatter`] that implements [OLPC-style canonical
//! JSON](http://wiki.laptop.org/go/Canonical_JSON), the serialization this
//! workspace signs and hashes against.
//!
//! This formatter does *not* sort object keys itself: canonical JSON also
//! requires lexicographic key order, and `serde_json::Serializer` calls the
//! formatter's map hooks in the order the caller's `Serialize` impl visits
//! entries. Callers are expected to back their maps with an already-ordered
//! container (`BTreeMap`, or a `HashMap` drained into a sorted `Vec` before
//! serialization) so that the order `serde_json` observes is already
//! canonical.

use serde_json::ser::{CharEscape, Formatter};
use std::io;
use unicode_normalization::UnicodeNormalization;

/// A `serde_json::ser::Formatter` implementing OLPC-style canonical JSON:
/// no insignificant whitespace, no scientific notation, floats rejected
/// outright (canonical JSON has no meaningful way to serialize them
/// losslessly), and strings normalized to Unicode NFC before escaping.
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalFormatter {
    /// Set once a float is encountered, since `Formatter` methods can't return
    /// an error through their `io::Result` return type in a way that
    /// distinguishes "not a float problem" — instead we record the failure
    /// and the caller's `.serialize()` call returns an `io::Error` built from
    /// it on the next write.
    float_encountered: bool,
}

impl CanonicalFormatter {
    /// Creates a new `CanonicalFormatter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn float_error() -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            "canonical JSON does not support floating point numbers",
        )
    }
}

impl Formatter for CanonicalFormatter {
    fn write_f32<W>(&mut self, _writer: &mut W, _value: f32) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.float_encountered = true;
        Err(Self::float_error())
    }

    fn write_f64<W>(&mut self, _writer: &mut W, _value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.float_encountered = true;
        Err(Self::float_error())
    }

    fn begin_string_fragment<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        Ok(())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let normalized: String = fragment.nfc().collect();
        writer.write_all(normalized.as_bytes())
    }

    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        use CharEscape::{
            AsciiControl, Backspace, CarriageReturn, FormFeed, LineFeed, Quote, ReverseSolidus,
            Solidus, Tab,
        };

        let s = match char_escape {
            Quote => "\\\"",
            ReverseSolidus => "\\\\",
            Solidus => "\\/",
            Backspace => "\\b",
            FormFeed => "\\f",
            LineFeed => "\\n",
            CarriageReturn => "\\r",
            Tab => "\\t",
            AsciiControl(byte) => {
                return write!(writer, "\\u{:04x}", byte);
            }
        };
        writer.write_all(s.as_bytes())
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"[")
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"]")
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !first {
            writer.write_all(b",")?;
        }
        Ok(())
    }

    fn end_array_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        Ok(())
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"}")
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !first {
            writer.write_all(b",")?;
        }
        Ok(())
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b":")
    }
}

#[cfg(test)]
mod tests {
    use super::CanonicalFormatter;
    use serde::Serialize;
    use serde_json::Serializer;
    use std::collections::BTreeMap;

    fn canonicalize<T: serde::Serialize>(value: &T) -> String {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, CanonicalFormatter::new());
        value.serialize(&mut ser).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn no_insignificant_whitespace() {
        let mut map = BTreeMap::new();
        map.insert("b", 2);
        map.insert("a", 1);
        assert_eq!(canonicalize(&map), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn rejects_floats() {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, CanonicalFormatter::new());
        assert!(1.5f64.serialize(&mut ser).is_err());
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(canonicalize(&"a\nb"), r#""a\nb""#);
    }
}
