//! Binary layout of the persistence file.
//!
//! ```text
//! "LCAT" | version: u8 | last issued id: u32
//! then, until EOF, one block per book:
//!   id: i32 | title | author | year: i32 | isbn | category | available: u8
//! ```
//!
//! Integers are little-endian and fixed width. Text is a `u32` byte length
//! followed by that many UTF-8 bytes. There is no record count: the reader
//! keeps decoding until the bytes run out.

use std::io::{self, Write};

use crate::models::Book;

pub const MAGIC: &[u8; 4] = b"LCAT";
pub const FORMAT_VERSION: u8 = 1;
/// Upper bound for a single text field. Anything larger is a corrupt length
/// prefix rather than a real title.
const MAX_TEXT_LEN: u32 = 16 * 1024 * 1024;

/// Everything recovered from a persistence file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Highest id ever issued by the store that wrote the file.
    pub last_issued_id: i32,
    pub books: Vec<Book>,
    /// Set when the file ended inside a record; that record is dropped.
    pub truncated: bool,
}

/// Serialize the header and every book, in catalog order.
pub fn encode<W: Write>(out: &mut W, last_issued_id: i32, books: &[Book]) -> io::Result<()> {
    out.write_all(MAGIC)?;
    out.write_all(&[FORMAT_VERSION])?;
    out.write_all(&(last_issued_id.max(0) as u32).to_le_bytes())?;

    for book in books {
        out.write_all(&book.id.to_le_bytes())?;
        write_text(out, &book.title)?;
        write_text(out, &book.author)?;
        out.write_all(&book.year.to_le_bytes())?;
        write_text(out, &book.isbn)?;
        write_text(out, &book.category)?;
        out.write_all(&[u8::from(book.available)])?;
    }
    Ok(())
}

fn write_text<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    let len = u32::try_from(text.len())
        .ok()
        .filter(|len| *len <= MAX_TEXT_LEN)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "text field too long"))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(text.as_bytes())
}

/// Parse a complete file image. `Err` carries a human-readable reason and
/// means nothing in the file can be trusted.
pub fn decode(bytes: &[u8]) -> Result<Decoded, String> {
    let mut reader = Reader { bytes, pos: 0 };

    let magic = reader.take(MAGIC.len()).ok_or("file is shorter than the header")?;
    if magic != MAGIC {
        return Err("missing LCAT header".to_string());
    }
    let version = reader.u8().ok_or("file is shorter than the header")?;
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }
    let last_issued = reader.u32().ok_or("file is shorter than the header")?;
    let last_issued_id =
        i32::try_from(last_issued).map_err(|_| format!("last issued id {last_issued} overflows"))?;

    let mut decoded = Decoded {
        last_issued_id,
        ..Decoded::default()
    };

    while !reader.is_empty() {
        match reader.book()? {
            Some(book) => decoded.books.push(book),
            None => {
                decoded.truncated = true;
                break;
            }
        }
    }

    Ok(decoded)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u32(&mut self) -> Option<u32> {
        let raw = self.take(4)?;
        Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn i32(&mut self) -> Option<i32> {
        self.u32().map(|v| v as i32)
    }

    /// `Ok(None)` means the input ended before the field was complete.
    fn text(&mut self) -> Result<Option<String>, String> {
        let Some(len) = self.u32() else {
            return Ok(None);
        };
        if len > MAX_TEXT_LEN {
            return Err(format!("text field length {len} at byte {} is implausible", self.pos - 4));
        }
        Ok(self.take(len as usize).map(|raw| String::from_utf8_lossy(raw).into_owned()))
    }

    fn book(&mut self) -> Result<Option<Book>, String> {
        macro_rules! field {
            ($e:expr) => {
                match $e {
                    Some(value) => value,
                    None => return Ok(None),
                }
            };
        }

        let id = field!(self.i32());
        let title = field!(self.text()?);
        let author = field!(self.text()?);
        let year = field!(self.i32());
        let isbn = field!(self.text()?);
        let category = field!(self.text()?);
        let available = match field!(self.u8()) {
            0 => false,
            1 => true,
            other => {
                return Err(format!(
                    "availability byte {other} for book {id} is neither 0 nor 1"
                ))
            }
        };

        Ok(Some(Book {
            id,
            title,
            author,
            year,
            isbn,
            category,
            available,
        }))
    }
}
