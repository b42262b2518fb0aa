//! # Utility Functions Module
//!
//! Small helpers shared by the tool bridge and the runner: argument vector
//! building and human-readable sizes.

/// Converts any iterable of displayable items into owned command arguments.
///
/// # Example
/// ```rust
/// use mago::utils::to_string_vec;
///
/// let quality = 85;
/// let args = to_string_vec(["-quality", &quality.to_string(), "in.png", "out.png"]);
/// assert_eq!(args[1], "85");
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds a `Vec<String>` of command arguments from mixed expressions.
///
/// ```rust
/// let width = 800;
/// let args = mago::args!["-resize", width, "in.jpg", "out.jpg"];
/// assert_eq!(args, vec!["-resize", "800", "in.jpg", "out.jpg"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Human-readable byte count
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Percentage saved going from `before` to `after` bytes, `None` when
/// there is nothing to compare against.
pub fn savings_percent(before: u64, after: u64) -> Option<f64> {
    if before == 0 {
        None
    } else {
        Some(100.0 - (after as f64 * 100.0 / before as f64))
    }
}
