use chrono::Local;

/// Millisecond-precision local timestamp used as the unique prefix of
/// chat titles. Colons are avoided so the result is filesystem-safe.
pub fn now_stamp() -> String {
    Local::now().format("%Y-%m-%dT%H-%M-%S%.3f").to_string()
}
