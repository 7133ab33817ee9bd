use relay_api::{Framing, RelayError};

/// Newline-delimited framing: `\n` завершает фрейм, `\r` перед ним отбрасывается.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinesFraming {
    max_length: usize,
}

impl LinesFraming {
    /// `max_length` в байтах, 0 = без ограничения.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Framing for LinesFraming {
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, RelayError> {
        // Ищем первый \n в буфере
        let pos = match buf.iter().position(|&b| b == b'\n') {
            Some(p) => p,
            None => {
                // Нет полной строки — проверяем max_length
                if self.max_length > 0 && buf.len() > self.max_length {
                    return Err(RelayError::format_err(format!(
                        "line too long: {} bytes (max {}) and no newline found",
                        buf.len(),
                        self.max_length
                    )));
                }
                return Ok(None);
            }
        };

        let consumed = pos + 1; // включая \n

        let line = &buf[..pos];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if self.max_length > 0 && line.len() > self.max_length {
            return Err(RelayError::format_err(format!(
                "line too long: {} bytes (max {})",
                line.len(),
                self.max_length
            )));
        }

        Ok(Some((line.to_vec(), consumed)))
    }

    fn encode(&self, data: &[u8], buf: &mut Vec<u8>) -> Result<(), RelayError> {
        buf.extend_from_slice(data);
        buf.push(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_api::ErrorKind;

    #[test]
    fn incomplete_line_waits_for_more() {
        let f = LinesFraming::default();
        assert!(f.decode(b"{\"topic\":").unwrap().is_none());
    }

    #[test]
    fn strips_crlf() {
        let f = LinesFraming::default();
        let (frame, consumed) = f.decode(b"abc\r\nrest").unwrap().unwrap();
        assert_eq!(frame, b"abc");
        assert_eq!(consumed, 5);
    }

    #[test]
    fn overlong_line_is_format_error() {
        let f = LinesFraming::new(4);
        let err = f.decode(b"abcdefgh").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        let err = f.decode(b"abcdef\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(f.decode(b"abcd\n").unwrap().is_some());
    }

    #[test]
    fn encode_appends_newline() {
        let mut out = Vec::new();
        LinesFraming::default().encode(b"x", &mut out).unwrap();
        LinesFraming::default().encode(b"y", &mut out).unwrap();
        assert_eq!(out, b"x\ny\n");
    }
}
