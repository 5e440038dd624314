//! Shared helpers for command output.

/// Render a byte count for humans.
pub fn format_bytes(size: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    if size == 0 {
        return "0B".to_string();
    }
    let exponent = (size as f64).log(1024.0).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = size as f64 / 1024f64.powi(exponent as i32);
    if exponent == 0 {
        format!("{size}B")
    } else {
        format!("{value:.2}{}", UNITS[exponent])
    }
}
