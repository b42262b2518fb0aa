//! # ImageMagick / pngquant bridge
//!
//! Implementazione reale di `ExternalTool`.
//!
//! ## Tool utilizzati
//!
//! | Operazione | Tool |
//! |------------|------|
//! | convert    | `magick` (IM7) oppure `convert` (IM6) |
//! | probe      | `magick identify` oppure `identify` |
//! | quantize   | `pngquant --force --ext .png` |
//! | touch      | `touch -m -t` |
//!
//! Ogni invocazione è limitata da `tokio::time::timeout`; allo scadere il
//! processo figlio viene terminato (`kill_on_drop`) e il target risulta
//! fallito invece di bloccare l'intero batch.

use super::{ConvertOptions, ExternalTool};
use crate::args;
use crate::error::MagoError;
use crate::probe::IDENTIFY_FORMAT;
use crate::tool_resolver::{ImageMagick, ToolResolver};
use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Output;
use std::time::{Duration, Instant, SystemTime};
use tokio::process::Command;
use tracing::{debug, warn};

/// Bridge to ImageMagick, pngquant and touch
#[derive(Debug, Clone)]
pub struct MagickTool {
    resolver: ToolResolver,
    magick: Option<ImageMagick>,
    timeout: Duration,
}

impl MagickTool {
    /// Create a bridge using `resolver` for lookups. A missing ImageMagick is
    /// only reported when a conversion or probe is attempted.
    pub fn new(resolver: ToolResolver, timeout: Duration) -> Self {
        let magick = ImageMagick::detect(&resolver);
        if magick.is_none() {
            warn!("ImageMagick not found, convert and probe will fail");
        }
        if !resolver.is_tool_available("pngquant") {
            debug!("pngquant not found, quantization will fail");
        }
        Self {
            resolver,
            magick,
            timeout,
        }
    }

    fn imagemagick(&self) -> Result<&ImageMagick, MagoError> {
        self.magick
            .as_ref()
            .ok_or_else(|| MagoError::MissingDependency(ToolResolver::install_hint("magick")))
    }

    /// Run a program to completion within the configured timeout
    async fn run(&self, tool_name: &str, program: &Path, args: &[String]) -> Result<Output, MagoError> {
        debug!("Running {:?} {:?}", program, args);
        let start_time = Instant::now();

        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                return Err(MagoError::ToolTimeout {
                    tool: tool_name.to_string(),
                    elapsed: start_time.elapsed(),
                })
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(MagoError::MissingDependency(ToolResolver::install_hint(tool_name)))
            }
            Ok(result) => result?,
        };

        debug!("{} finished in {:?} with {}", tool_name, start_time.elapsed(), output.status);

        if output.status.success() {
            Ok(output)
        } else {
            Err(MagoError::ToolFailed {
                tool: tool_name.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Arguments for a conversion, input first so both IM6 and IM7 accept them
pub fn convert_args(src: &Path, dest: &Path, options: &ConvertOptions) -> Vec<String> {
    let mut args = args![src.display()];

    if let Some(quality) = options.quality {
        args.extend(args!["-quality", quality]);
    }
    if let Some(ref resize) = options.resize {
        args.extend(args!["-resize", resize]);
    }
    if options.monochrome {
        args.push("-monochrome".to_string());
    }
    if options.desaturate {
        args.extend(args!["-channel", "RGB", "-colorspace", "gray", "+channel"]);
    }

    args.push(dest.display().to_string());
    args
}

/// Arguments for an in-place pngquant run
pub fn quantize_args(path: &Path, quality: Option<u8>) -> Vec<String> {
    let mut args = args!["--force", "--ext", ".png"];
    if let Some(quality) = quality {
        args.extend(args!["--quality", format!("0-{}", quality)]);
    }
    args.push(path.display().to_string());
    args
}

/// `touch -t` timestamp in local time
pub fn touch_timestamp(modified: SystemTime) -> String {
    DateTime::<Local>::from(modified)
        .format("%Y%m%d%H%M.%S")
        .to_string()
}

impl ExternalTool for MagickTool {
    async fn convert(&self, src: &Path, dest: &Path, options: &ConvertOptions) -> Result<(), MagoError> {
        let (program, mut args) = self.imagemagick()?.convert_command();
        args.extend(convert_args(src, dest, options));
        self.run("convert", program, &args).await.map(|_| ())
    }

    async fn quantize(&self, path: &Path, quality: Option<u8>) -> Result<(), MagoError> {
        let program = self.resolver.command_path("pngquant");
        self.run("pngquant", &program, &quantize_args(path, quality))
            .await
            .map(|_| ())
    }

    async fn touch(&self, path: &Path, modified: SystemTime) -> Result<(), MagoError> {
        let program = self.resolver.command_path("touch");
        let args = args!["-m", "-t", touch_timestamp(modified), path.display()];
        self.run("touch", &program, &args).await.map(|_| ())
    }

    async fn probe(&self, path: &Path) -> Result<String, MagoError> {
        let (program, mut args) = self.imagemagick()?.identify_command();
        args.extend(args!["-format", IDENTIFY_FORMAT, path.display()]);
        let output = self.run("identify", program, &args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
