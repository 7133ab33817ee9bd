// ═══════════════════════════════════════════════════════════════
//  CsvRowWriter
// ═══════════════════════════════════════════════════════════════

/// Сериализация строк durable лога (RFC 4180).
///
/// Поле заключается в кавычки, если содержит разделитель, `"`, `\r`, `\n`
/// или начинается с пробельного символа; кавычки внутри удваиваются.
#[derive(Debug, Clone, Copy)]
pub struct CsvRowWriter {
    delimiter: char,
}

impl Default for CsvRowWriter {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl CsvRowWriter {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Дописать одну строку (с `\n`) в `out`.
    pub fn write_row<S: AsRef<str>>(&self, fields: &[S], out: &mut String) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                out.push(self.delimiter);
            }
            let s = field.as_ref();
            if self.needs_quotes(s) {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            } else {
                out.push_str(s);
            }
        }
        out.push('\n');
    }

    fn needs_quotes(&self, s: &str) -> bool {
        s.starts_with(char::is_whitespace)
            || s.contains(|c| c == self.delimiter || c == '"' || c == '\r' || c == '\n')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row() {
        let mut out = String::new();
        CsvRowWriter::default().write_row(&["time", "topic", "payload"], &mut out);
        assert_eq!(out, "time,topic,payload\n");
    }

    #[test]
    fn quotes_json_payload() {
        let mut out = String::new();
        CsvRowWriter::default().write_row(&["0", "water", r#"{"t":1}"#], &mut out);
        assert_eq!(out, "0,water,\"{\"\"t\"\":1}\"\n");
    }

    #[test]
    fn quotes_delimiter_and_leading_space() {
        let mut out = String::new();
        CsvRowWriter::new(';').write_row(&["a;b", " c", "d,e"], &mut out);
        assert_eq!(out, "\"a;b\";\" c\";d,e\n");
    }

    #[test]
    fn embedded_newline_stays_in_one_field() {
        let mut out = String::new();
        CsvRowWriter::default().write_row(&["1", "log", "a\nb"], &mut out);
        assert_eq!(out, "1,log,\"a\nb\"\n");
    }
}
