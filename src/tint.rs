//! # Tint Transform
//!
//! Sostituisce il colore di tutti i pixel non completamente trasparenti
//! (alpha > 0) con un colore piatto, lasciando invariato il canale alpha.
//!
//! ## Flusso:
//! 1. Risolve la specifica colore (`#rgb`, `#rrggbb`, `#rrggbbaa`, nome CSS)
//! 2. Decodifica l'immagine in un buffer RGBA (crate `image`)
//! 3. Passata sui pixel
//! 4. Salva sopra l'originale, a meno di dry-run
//!
//! La decodifica è disponibile solo con la feature `tint` (attiva di
//! default). Senza, `tint_file` restituisce `MagoError::MissingDependency`
//! e il runner lo riporta come fallimento del singolo target.

use crate::error::MagoError;
use std::path::Path;

/// A concrete RGB colour
pub type Rgb = [u8; 3];

const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("lime", [0, 255, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("aqua", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("fuchsia", [255, 0, 255]),
    ("silver", [192, 192, 192]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("darkgray", [169, 169, 169]),
    ("darkgrey", [169, 169, 169]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("purple", [128, 0, 128]),
    ("teal", [0, 128, 128]),
    ("navy", [0, 0, 128]),
    ("orange", [255, 165, 0]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gold", [255, 215, 0]),
    ("indigo", [75, 0, 130]),
    ("violet", [238, 130, 238]),
    ("crimson", [220, 20, 60]),
    ("coral", [255, 127, 80]),
    ("salmon", [250, 128, 114]),
    ("tomato", [255, 99, 71]),
    ("khaki", [240, 230, 140]),
    ("beige", [245, 245, 220]),
    ("ivory", [255, 255, 240]),
    ("turquoise", [64, 224, 208]),
    ("skyblue", [135, 206, 235]),
    ("steelblue", [70, 130, 180]),
    ("royalblue", [65, 105, 225]),
    ("darkred", [139, 0, 0]),
    ("darkgreen", [0, 100, 0]),
    ("darkblue", [0, 0, 139]),
];

/// Resolve a hex or named colour specification into RGB bytes
pub fn resolve_color(spec: &str) -> Result<Rgb, MagoError> {
    let spec = spec.trim();
    let invalid = || MagoError::InvalidColor(spec.to_string());

    if let Some(hex) = spec.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        return match hex.len() {
            3 => {
                let r = channel(&hex[0..1].repeat(2))?;
                let g = channel(&hex[1..2].repeat(2))?;
                let b = channel(&hex[2..3].repeat(2))?;
                Ok([r, g, b])
            }
            // #rrggbbaa: the alpha byte is ignored, the pass never touches alpha
            6 | 8 => Ok([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
            _ => Err(invalid()),
        };
    }

    let name = spec.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, rgb)| *rgb)
        .ok_or_else(invalid)
}

/// Overwrite RGB of every RGBA pixel whose alpha is above zero.
/// Returns how many pixels were changed.
pub fn tint_pixels(rgba: &mut [u8], color: Rgb) -> usize {
    let mut tinted = 0;
    for pixel in rgba.chunks_exact_mut(4) {
        if pixel[3] > 0 {
            pixel[..3].copy_from_slice(&color);
            tinted += 1;
        }
    }
    tinted
}

/// Tint an image file in place. With `dry_run` the full decode and pixel
/// pass still run, the result is dropped.
#[cfg(feature = "tint")]
pub fn tint_file(path: &Path, color_spec: &str, dry_run: bool) -> Result<usize, MagoError> {
    use image::DynamicImage;

    let color = resolve_color(color_spec)?;
    let decoded = image::open(path)?;
    let had_alpha = decoded.color().has_alpha();

    let mut buffer = decoded.to_rgba8();
    let tinted = tint_pixels(&mut buffer, color);
    tracing::debug!("Tinted {} pixels of {}", tinted, path.display());

    if !dry_run {
        let output = DynamicImage::ImageRgba8(buffer);
        if had_alpha {
            output.save(path)?;
        } else {
            // Encoders such as JPEG reject an alpha channel the source never had
            DynamicImage::ImageRgb8(output.to_rgb8()).save(path)?;
        }
    }

    Ok(tinted)
}

#[cfg(not(feature = "tint"))]
pub fn tint_file(_path: &Path, color_spec: &str, _dry_run: bool) -> Result<usize, MagoError> {
    resolve_color(color_spec)?;
    Err(MagoError::MissingDependency(
        "image decoding support is not compiled in (rebuild with --features tint)".to_string(),
    ))
}
