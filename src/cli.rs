//! # Command Line
//!
//! Parsing degli argomenti con `clap` e costruzione della `RunConfiguration`.
//!
//! Le opzioni lunghe con un solo trattino della vecchia interfaccia
//! (`-resize`, `-suffix`, `-if-size`, `-color`) vengono riscritte nella forma
//! con due trattini prima del parsing, quindi funzionano entrambe.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! mago resizer photos/ -m 1600 -q 85 --keep-mtime
//! mago convert a.png b.png -f webp -suffix _small -resize 50%
//! mago resizer-db -d psql:dbname=shop:products:image -s 400 --dry-run
//! ```

use crate::config::{FrameSize, RunConfiguration, Subprogram};
use crate::error::MagoError;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Long options accepted with a single dash
const SINGLE_DASH_LONGS: &[&str] = &["resize", "suffix", "if-size", "color"];

#[derive(Parser, Debug)]
#[command(name = "mago")]
#[command(about = "Batch resize, convert, quantize and tint images on disk or in PostgreSQL")]
pub struct Args {
    /// One of: resizer, resizer-db, pngquant, png2jpeg, convert, tint
    pub subprogram: String,

    /// Image files or directories
    pub paths: Vec<PathBuf>,

    /// Resize images wider than this
    #[arg(short = 'm', long = "max-width")]
    pub max_width: Option<u32>,

    /// Target width for resizer-db
    #[arg(short = 's', long)]
    pub size: Option<u32>,

    /// Target format (jpg, png, gif, webp, tiff, bmp)
    #[arg(short = 'f', long = "format")]
    pub format: Option<String>,

    /// Re-encode quality (0-100)
    #[arg(short = 'q', long)]
    pub quality: Option<u8>,

    /// ImageMagick geometry applied by convert
    #[arg(long)]
    pub resize: Option<String>,

    /// Inserted before the new extension by convert
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Only quantize images of exactly WxH
    #[arg(long = "if-size")]
    pub if_size: Option<String>,

    /// Database source, psql:<connection>:<table>:<column>
    #[arg(short = 'd', long)]
    pub dsn: Option<String>,

    /// Only process this row id
    #[arg(long)]
    pub rowid: Option<i64>,

    /// Tint colour, hex or named
    #[arg(long, default_value = "black")]
    pub color: String,

    /// Preserve the modification time of files rewritten in place
    #[arg(long)]
    pub keep_mtime: bool,

    /// png2jpeg: replace the original file instead of writing <name>.jpg
    #[arg(long)]
    pub keep_extension: bool,

    /// Run pngquant after producing a PNG
    #[arg(long)]
    pub optimize_png: bool,

    #[arg(long)]
    pub monochrome: bool,

    /// Convert to grayscale, keeping transparency
    #[arg(long)]
    pub desaturate: bool,

    /// png2jpeg: only convert images without transparency
    #[arg(long)]
    pub if_opaque: bool,

    /// Compute everything, write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Emit JSON lines on stdout
    #[arg(long)]
    pub json: bool,

    /// Seconds before an external tool call is abandoned
    #[arg(long, default_value = "120")]
    pub timeout: u64,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the process arguments, accepting single-dash long options
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Build and validate the immutable run configuration
    pub fn into_configuration(self) -> Result<RunConfiguration, MagoError> {
        let subprogram: Subprogram = self.subprogram.parse()?;
        let if_size = self.if_size.as_deref().map(str::parse::<FrameSize>).transpose()?;

        let config = RunConfiguration {
            subprogram,
            paths: self.paths,
            max_width: self.max_width,
            size: self.size,
            to_format: self.format.map(|f| f.to_ascii_lowercase()),
            quality: self.quality,
            resize: self.resize,
            suffix: self.suffix,
            if_size,
            dsn: self.dsn,
            rowid: self.rowid,
            color: self.color,
            keep_mtime: self.keep_mtime,
            keep_extension: self.keep_extension,
            optimize_png: self.optimize_png,
            monochrome: self.monochrome,
            desaturate: self.desaturate,
            if_opaque: self.if_opaque,
            dry_run: self.dry_run,
            verbose: self.verbose,
            json_output: self.json,
            timeout_secs: self.timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Rewrite `-resize x` / `-resize=x` style options to their `--` form
pub fn normalize_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.into_iter()
        .map(|arg| {
            let arg: OsString = arg.into();
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-').filter(|r| !r.starts_with('-')) else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if SINGLE_DASH_LONGS.contains(&name) {
                OsString::from(format!("-{}", text))
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(normalize_args(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_normalize_single_dash_longs() {
        let args = normalize_args(["mago", "convert", "-resize", "50%", "-suffix=_s", "-f", "png", "--color", "red"]);
        assert_eq!(
            args,
            vec!["mago", "convert", "--resize", "50%", "--suffix=_s", "-f", "png", "--color", "red"]
        );
    }

    #[test]
    fn test_full_option_surface() {
        let args = parse(&[
            "mago", "convert", "a.png", "b.png", "-f", "WEBP", "-q", "80", "-resize", "50%",
            "-suffix", "_small", "--optimize-png", "--desaturate", "-v",
        ]);
        let config = args.into_configuration().unwrap();
        assert_eq!(config.subprogram, Subprogram::Convert);
        assert_eq!(config.paths, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert_eq!(config.to_format.as_deref(), Some("webp"));
        assert_eq!(config.quality, Some(80));
        assert_eq!(config.resize.as_deref(), Some("50%"));
        assert_eq!(config.suffix, "_small");
        assert!(config.optimize_png && config.desaturate && config.verbose);
    }

    #[test]
    fn test_if_size_and_color() {
        let config = parse(&["mago", "pngquant", "x.png", "-if-size", "200x100"])
            .into_configuration()
            .unwrap();
        assert_eq!(config.if_size, Some(FrameSize { width: 200, height: 100 }));
        assert_eq!(config.color, "black");

        let config = parse(&["mago", "tint", "x.png", "-color", "#ff0000"])
            .into_configuration()
            .unwrap();
        assert_eq!(config.color, "#ff0000");
    }

    #[test]
    fn test_configuration_errors() {
        let err = parse(&["mago", "shrink", "a.png"]).into_configuration().unwrap_err();
        assert!(err.is_fatal());

        let err = parse(&["mago", "convert", "a.png"]).into_configuration().unwrap_err();
        assert!(err.is_fatal());

        let err = parse(&["mago", "pngquant", "a.png", "-if-size", "huge"])
            .into_configuration()
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_database_options() {
        let config = parse(&[
            "mago", "resizer-db", "-d", "psql:dbname=shop:products:image", "--rowid", "42", "-m", "1000", "-s", "300",
        ])
        .into_configuration()
        .unwrap();
        assert_eq!(config.rowid, Some(42));
        assert_eq!(config.max_width, Some(1000));
        assert_eq!(config.size, Some(300));
        assert!(config.paths.is_empty());
    }
}
