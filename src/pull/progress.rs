//! Terminal rendering for pull progress: the color palette, progress bar,
//! spinner, digest shortening, and human-readable byte counts.
//!
//! Everything here is a pure function of its inputs. The palette is a value
//! constructed once per pull and passed in, so concurrent pulls with
//! different settings never interfere through shared state.

/// Width of the rendered progress bar in columns.
pub const PROGRESS_BAR_WIDTH: usize = 30;

/// Spinner frames shown for records that carry no size information.
pub const SPINNER_FRAMES: [&str; 4] = ["-", "\\", "|", "/"];

/// ANSI color codes used by the progress renderer.
///
/// Construct with [`Palette::from_env`] at the start of a pull; when the
/// `NO_COLOR` environment variable is set to a non-empty value every code is
/// the empty string and output is plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub blue: &'static str,
    pub cyan: &'static str,
    pub magenta: &'static str,
    pub white: &'static str,
    pub reset: &'static str,
}

impl Palette {
    /// The standard bright ANSI palette.
    #[must_use]
    pub const fn color() -> Self {
        Self {
            blue: "\x1b[94m",
            cyan: "\x1b[96m",
            magenta: "\x1b[95m",
            white: "\x1b[97m",
            reset: "\x1b[0m",
        }
    }

    /// A palette with every code empty, for plain-text output.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            blue: "",
            cyan: "",
            magenta: "",
            white: "",
            reset: "",
        }
    }

    /// Honors the `NO_COLOR` convention: any non-empty value disables color.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("NO_COLOR") {
            Ok(value) if !value.is_empty() => Self::plain(),
            _ => Self::color(),
        }
    }
}

/// Number of filled columns for a completion percentage.
///
/// Rounded to the nearest column and clamped to `[0, width]`, so negative,
/// over-100, and NaN inputs all produce a well-formed bar.
#[must_use]
pub fn filled_columns(progress_percent: f64, width: usize) -> usize {
    let filled = (progress_percent / 100.0 * width as f64).round() as i64;
    filled.clamp(0, width as i64) as usize
}

/// Renders a progress bar of exactly `width` columns (ignoring color codes):
/// `filled` fill characters, then spaces. The filled run is colored in thirds
/// (blue, magenta, cyan) and the unfilled remainder in white; with a plain
/// palette the output is the bare bar.
#[must_use]
pub fn render_bar(palette: &Palette, progress_percent: f64, width: usize) -> String {
    let filled = filled_columns(progress_percent, width);
    let first_boundary = width / 3;
    let second_boundary = width * 2 / 3;

    let blue_len = filled.min(first_boundary);
    let magenta_len = filled
        .saturating_sub(first_boundary)
        .min(second_boundary - first_boundary);
    let cyan_len = filled.saturating_sub(second_boundary);

    format!(
        "{}{}{}{}{}{}{}{}",
        palette.blue,
        "=".repeat(blue_len),
        palette.magenta,
        "=".repeat(magenta_len),
        palette.cyan,
        "=".repeat(cyan_len),
        palette.white,
        " ".repeat(width - filled),
    )
}

/// Shortens a layer digest for display: strips the `sha256:` prefix and
/// keeps the first 8 characters.
#[must_use]
pub fn short_digest(digest: &str) -> &str {
    let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
    hex.get(..8).unwrap_or(hex)
}

const BYTE_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Formats a byte count with SI units (base 1000): `512 MB`, `1.5 kB`, `4.7 GB`.
///
/// One decimal place below 10, none at or above.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }
    let exponent = (((bytes as f64).ln() / 1000_f64.ln()).floor() as usize).min(BYTE_UNITS.len() - 1);
    let value = ((bytes as f64 / 1000_f64.powi(exponent as i32)) * 10.0 + 0.5).floor() / 10.0;
    let unit = BYTE_UNITS[exponent];
    if value < 10.0 {
        format!("{value:.1} {unit}")
    } else {
        format!("{value:.0} {unit}")
    }
}

/// The in-place spinner line shown for records without size information.
#[must_use]
pub fn manifest_line(palette: &Palette, frame: &str) -> String {
    format!("\r{}Pulling manifest... {}{}", palette.white, frame, palette.reset)
}

/// The in-place progress line shown for download records.
#[must_use]
pub fn download_line(
    palette: &Palette,
    model: &str,
    digest: &str,
    progress_percent: f64,
    completed: u64,
    total: u64,
) -> String {
    format!(
        "\r{}{} - {} [{}] {:.2}% - {}/{} {}",
        palette.white,
        model,
        short_digest(digest),
        render_bar(palette, progress_percent, PROGRESS_BAR_WIDTH),
        progress_percent,
        format_bytes(completed),
        format_bytes(total),
        palette.reset,
    )
}

/// The final line printed when the server reports success. Clears to the
/// end of the line so no stale progress text survives the overwrite.
#[must_use]
pub fn completion_line(model: &str) -> String {
    format!("\r{} - Download complete!\x1b[K\n", model)
}
