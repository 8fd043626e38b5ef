//! Minimal RFC 4180 writer for the attendance export.

use std::borrow::Cow;

/// Append one CRLF-terminated row to `out`.
pub fn write_row<I, T>(out: &mut String, fields: I)
where
  I: IntoIterator<Item = T>,
  T: AsRef<str>,
{
  for (i, field) in fields.into_iter().enumerate() {
    if i > 0 {
      out.push(',');
    }
    out.push_str(&quote(field.as_ref()));
  }
  out.push_str("\r\n");
}

fn quote(field: &str) -> Cow<'_, str> {
  if field.contains([',', '"', '\r', '\n']) {
    Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
  } else {
    Cow::Borrowed(field)
  }
}
