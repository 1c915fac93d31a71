use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{LinkError, Result};

/// Platform line terminator used when writing output lines
#[cfg(windows)]
pub const LINE_TERMINATOR: &[u8] = b"\r\n";
#[cfg(not(windows))]
pub const LINE_TERMINATOR: &[u8] = b"\n";

/// Character encoding of input and output files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8, invalid sequences replaced on read
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per character
    Latin1,
}

impl Encoding {
    /// Decode one raw line (terminator already stripped) into a string
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Encode a string for writing; characters outside Latin-1 become '?'
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(format!("unknown encoding: {}", other)),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "UTF-8"),
            Encoding::Latin1 => write!(f, "Latin-1"),
        }
    }
}

/// Buffered line reader that decodes each line with a fixed encoding
pub struct LineReader {
    inner: BufReader<File>,
    encoding: Encoding,
    buf: Vec<u8>,
}

impl LineReader {
    pub fn open(path: &Path, encoding: Encoding) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                LinkError::FileNotFound(path.display().to_string())
            }
            _ => LinkError::Io(e),
        })?;
        Ok(Self {
            inner: BufReader::new(file),
            encoding,
            buf: Vec::new(),
        })
    }

    /// Read the next line with terminators stripped; None at end of file
    pub fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let read = self.inner.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
            self.buf.pop();
        }
        Ok(Some(self.encoding.decode(&self.buf)))
    }
}

/// Write one line plus the platform terminator
pub fn write_line<W: Write>(writer: &mut W, line: &str, encoding: Encoding) -> Result<()> {
    writer.write_all(&encoding.encode(line))?;
    writer.write_all(LINE_TERMINATOR)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_parse() {
        assert_eq!("utf-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("Latin1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert!("ebcdic".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_latin1_round_trip() {
        let enc = Encoding::Latin1;
        let bytes: Vec<u8> = vec![0x41, 0xE9, 0xFC]; // A é ü
        let text = enc.decode(&bytes);
        assert_eq!(text, "Aéü");
        assert_eq!(enc.encode(&text), bytes);
    }

    #[test]
    fn test_latin1_unmappable_char() {
        assert_eq!(Encoding::Latin1.encode("a\u{4e2d}b"), b"a?b".to_vec());
    }
}
