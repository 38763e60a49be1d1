use chrono::DateTime;

/// Renders Unix seconds the way the listings print them.
pub fn format_time(unix: i64) -> String {
  match DateTime::from_timestamp(unix, 0) {
    Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
    None => String::from("<out of range>"),
  }
}

#[cfg(test)]
mod util_tests {
  use super::*;

  #[test]
  fn format_time_renders_the_epoch() {
    assert_eq!(format_time(0), "1970-01-01 00:00:00");
  }

  #[test]
  fn format_time_survives_nonsense() {
    assert_eq!(format_time(i64::MAX), "<out of range>");
  }
}

// vim:ts=2 sw=2
