//! Field-by-field tokenizer for comma separated AT response bodies.
//!
//! Every primitive either consumes one field and returns its value, or fails without
//! consuming anything. Empty fields (a separator or the end of the line right at the cursor)
//! are reported as `None`, meaning "absent", and are not an error.

use core::str::FromStr;

use super::AtParseErr;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Self {
        Tokenizer { rest: line }
    }

    /// Start tokenizing after `prefix`, failing if the line does not start with it.
    pub fn with_prefix(line: &'a str, prefix: &str) -> Result<Self, AtParseErr> {
        line.strip_prefix(prefix)
            .map(Tokenizer::new)
            .ok_or_else(|| "Missing prefix".into())
    }

    /// The part of the line that has not been consumed yet.
    pub fn rest(&self) -> &'a str {
        self.rest
    }

    pub fn is_end(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn end(&self) -> Result<(), AtParseErr> {
        self.is_end()
            .then_some(())
            .ok_or_else(|| "Trailing characters".into())
    }

    pub fn is_empty_field(&self) -> bool {
        self.rest.is_empty() || self.rest.starts_with(',')
    }

    /// Consume a `,` if there is one. Returns whether a separator was consumed.
    pub fn sep(&mut self) -> bool {
        match self.rest.strip_prefix(',') {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    pub fn expect_sep(&mut self) -> Result<(), AtParseErr> {
        self.sep().then_some(()).ok_or_else(|| "Missing ','".into())
    }

    /// Split off the raw text of the current field, up to the next `,` or the end.
    fn field(&self) -> (&'a str, &'a str) {
        match self.rest.find(',') {
            Some(i) => self.rest.split_at(i),
            None => (self.rest, ""),
        }
    }

    /// Parse a decimal number field.
    pub fn num<T: FromStr>(&mut self) -> Result<Option<T>, AtParseErr> {
        if self.is_empty_field() {
            return Ok(None);
        }

        let (field, rest) = self.field();
        let value = field.parse().map_err(|_| AtParseErr::from("Invalid number"))?;
        self.rest = rest;
        Ok(Some(value))
    }

    /// Parse an unsigned field, decimal or hexadecimal with a `0x` prefix.
    pub fn uint(&mut self) -> Result<Option<u32>, AtParseErr> {
        if self.is_empty_field() {
            return Ok(None);
        }

        let (field, rest) = self.field();
        let value = match field
            .strip_prefix("0x")
            .or_else(|| field.strip_prefix("0X"))
        {
            Some(hex) => u32::from_str_radix(hex, 16)?,
            None => field.parse()?,
        };
        self.rest = rest;
        Ok(Some(value))
    }

    pub fn float(&mut self) -> Result<Option<f32>, AtParseErr> {
        if self.is_empty_field() {
            return Ok(None);
        }

        let (field, rest) = self.field();
        let value = field.parse()?;
        self.rest = rest;
        Ok(Some(value))
    }

    /// Parse a quoted string field, returning the text between the quotes.
    ///
    /// The closing quote must be followed by a separator or the end of the line.
    pub fn quoted(&mut self) -> Result<Option<&'a str>, AtParseErr> {
        if self.is_empty_field() {
            return Ok(None);
        }

        let inner = self.rest.strip_prefix('"').ok_or("Missing opening '\"'")?;
        let end = inner.find('"').ok_or("Missing closing '\"'")?;
        let (value, rest) = inner.split_at(end);
        let rest = &rest[1..];
        if !(rest.is_empty() || rest.starts_with(',')) {
            return Err("Garbage after closing '\"'".into());
        }

        self.rest = rest;
        Ok(Some(value))
    }

    /// Consume pairs of hex digits into `buf`, greedily. Returns the number of bytes written.
    pub fn hex(&mut self, buf: &mut [u8]) -> Result<usize, AtParseErr> {
        let bytes = self.rest.as_bytes();
        let mut written = 0;

        while let &[hi, lo, ..] = &bytes[written * 2..] {
            let (Some(hi), Some(lo)) = (hex_value(hi), hex_value(lo)) else {
                break;
            };
            let slot = buf.get_mut(written).ok_or("Hex buffer too small")?;
            *slot = (hi << 4) | lo;
            written += 1;
        }

        self.rest = &self.rest[written * 2..];
        Ok(written)
    }
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|v| v as u8)
}
