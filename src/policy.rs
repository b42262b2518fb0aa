//! # Policy Engine
//!
//! Decide, per ogni target, se un subprogram deve agire e con quali
//! parametri. È puro: riceve identità, path e configurazione e restituisce
//! un'`Action`, senza effetti collaterali. L'esecuzione spetta al runner.
//!
//! ## Regole per subprogram:
//! - **resizer**: agisce solo se `max_width` è impostato e la larghezza la supera
//! - **resizer-db**: agisce sempre; larghezza da `max_width` (se superato) o `size`
//! - **pngquant**: agisce se non c'è `if_size` oppure le dimensioni coincidono
//! - **png2jpeg**: scrive `<path>.jpg`; con `if_opaque` salta le immagini trasparenti
//! - **convert**: agisce sempre, richiede `to_format`
//! - **tint**: agisce sempre, delega al modulo `tint`

use crate::config::{FrameSize, RunConfiguration, Subprogram};
use crate::error::MagoError;
use crate::probe::ImageIdentity;
use crate::tools::ConvertOptions;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a target was left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// No `-m` threshold was given
    NoMaxWidth,
    WithinMaxWidth { width: u32, max_width: u32 },
    SizeMismatch { expected: FrameSize, actual: Option<(u32, u32)> },
    Transparent,
    UnknownFormat,
    /// The target could not be identified
    NotIdentified,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMaxWidth => write!(f, "no max width configured"),
            Self::WithinMaxWidth { width, max_width } => {
                write!(f, "width {} is within {}", width, max_width)
            }
            Self::SizeMismatch { expected, actual } => match actual {
                Some((w, h)) => write!(f, "size {}x{} does not match {}", w, h, expected),
                None => write!(f, "unknown size does not match {}", expected),
            },
            Self::Transparent => write!(f, "image has transparency"),
            Self::UnknownFormat => write!(f, "image format is unknown"),
            Self::NotIdentified => write!(f, "image could not be identified"),
        }
    }
}

/// A decided, parameterized conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub target_width: Option<u32>,
    /// Free-form ImageMagick geometry (`-resize` of the convert subprogram)
    pub geometry: Option<String>,
    pub quality: Option<u8>,
    pub monochrome: bool,
    pub desaturate: bool,
    pub output_format: Option<String>,
    /// Run pngquant on the destination afterwards
    pub quantize: bool,
    /// Move the destination over the source once written
    pub replace_source: bool,
}

impl ConversionPlan {
    fn new(source: &Path, destination: PathBuf) -> Self {
        Self {
            source: source.to_path_buf(),
            destination,
            target_width: None,
            geometry: None,
            quality: None,
            monochrome: false,
            desaturate: false,
            output_format: None,
            quantize: false,
            replace_source: false,
        }
    }

    /// Options handed to the external tool
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            quality: self.quality,
            resize: self
                .target_width
                .map(|w| w.to_string())
                .or_else(|| self.geometry.clone()),
            monochrome: self.monochrome,
            desaturate: self.desaturate,
        }
    }

    /// Where the result ends up once the plan has run
    pub fn final_path(&self) -> &Path {
        if self.replace_source {
            &self.source
        } else {
            &self.destination
        }
    }

    /// True when the result overwrites the source
    pub fn is_in_place(&self) -> bool {
        self.replace_source || self.destination == self.source
    }
}

/// What to do with one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Skip(SkipReason),
    Resize(ConversionPlan),
    Convert(ConversionPlan),
    Quantize { path: PathBuf },
    Tint { path: PathBuf, color: String },
}

/// Decide the action for `source`.
///
/// `identity` is `None` when the subprogram does not need a probe; a
/// subprogram that does need one never acts without it.
pub fn plan(
    config: &RunConfiguration,
    identity: Option<&ImageIdentity>,
    source: &Path,
) -> Result<Action, MagoError> {
    let subprogram = config.subprogram;
    let identity = match identity {
        Some(identity) => Some(identity),
        None if subprogram.requires_probe() => return Ok(Action::Skip(SkipReason::NotIdentified)),
        None => None,
    };

    let action = match (subprogram, identity) {
        (Subprogram::Resizer, Some(identity)) => plan_resize(config, identity, source),
        (Subprogram::ResizerDb, Some(identity)) => plan_resize_blob(config, identity, source),
        (Subprogram::Pngquant, Some(identity)) => plan_quantize(config, identity, source),
        (Subprogram::Png2jpeg, Some(identity)) => plan_png2jpeg(config, identity, source),
        (Subprogram::Convert, _) => plan_convert(config, source)?,
        (Subprogram::Tint, _) => Action::Tint {
            path: source.to_path_buf(),
            color: config.color.clone(),
        },
        (_, None) => Action::Skip(SkipReason::NotIdentified),
    };

    Ok(action)
}

fn plan_resize(config: &RunConfiguration, identity: &ImageIdentity, source: &Path) -> Action {
    let Some(max_width) = config.max_width else {
        return Action::Skip(SkipReason::NoMaxWidth);
    };
    if identity.width <= max_width {
        return Action::Skip(SkipReason::WithinMaxWidth {
            width: identity.width,
            max_width,
        });
    }

    let mut plan = ConversionPlan::new(source, source.to_path_buf());
    plan.target_width = Some(max_width);
    plan.quality = config.quality;
    Action::Resize(plan)
}

fn plan_resize_blob(config: &RunConfiguration, identity: &ImageIdentity, source: &Path) -> Action {
    let Some(format) = config.to_format.clone().or_else(|| identity.format.clone()) else {
        return Action::Skip(SkipReason::UnknownFormat);
    };

    let target_width = match (config.max_width, config.size) {
        (Some(max_width), _) if identity.width > max_width => Some(max_width),
        (_, Some(size)) => Some(size),
        _ => None,
    };

    let mut plan = ConversionPlan::new(source, append_extension(source, &format));
    plan.target_width = target_width;
    plan.quality = config.quality;
    plan.monochrome = config.monochrome;
    plan.desaturate = config.desaturate;
    plan.quantize = config.optimize_png && format == "png";
    plan.output_format = Some(format);
    Action::Resize(plan)
}

fn plan_quantize(config: &RunConfiguration, identity: &ImageIdentity, source: &Path) -> Action {
    if let Some(expected) = config.if_size {
        let actual = identity.dimensions();
        if actual != Some((expected.width, expected.height)) {
            return Action::Skip(SkipReason::SizeMismatch { expected, actual });
        }
    }
    Action::Quantize {
        path: source.to_path_buf(),
    }
}

fn plan_png2jpeg(config: &RunConfiguration, identity: &ImageIdentity, source: &Path) -> Action {
    if config.if_opaque && identity.is_transparent {
        return Action::Skip(SkipReason::Transparent);
    }

    let mut plan = ConversionPlan::new(source, append_extension(source, "jpg"));
    plan.quality = config.quality;
    plan.output_format = Some("jpg".to_string());
    plan.replace_source = config.keep_extension;
    Action::Convert(plan)
}

fn plan_convert(config: &RunConfiguration, source: &Path) -> Result<Action, MagoError> {
    let format = config
        .to_format
        .as_deref()
        .ok_or_else(|| MagoError::config("-f <format> is required to convert"))?;

    let mut plan = ConversionPlan::new(source, converted_destination(source, &config.suffix, format));
    plan.geometry = config.resize.clone();
    plan.quality = config.quality;
    plan.monochrome = config.monochrome;
    plan.desaturate = config.desaturate;
    plan.quantize = config.optimize_png && format == "png";
    plan.output_format = Some(format.to_string());
    Ok(Action::Convert(plan))
}

/// `photo.png` + `jpg` -> `photo.png.jpg`
pub fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// `dir/photo.png` + `_small` + `webp` -> `dir/photo_small.webp`
pub fn converted_destination(path: &Path, suffix: &str, format: &str) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!("{}{}.{}", stem, suffix, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(width: u32, height: u32, format: &str, transparent: bool) -> ImageIdentity {
        ImageIdentity {
            width,
            height: Some(height),
            format: Some(format.to_string()),
            is_transparent: transparent,
        }
    }

    fn config(subprogram: Subprogram) -> RunConfiguration {
        RunConfiguration {
            subprogram,
            ..Default::default()
        }
    }

    #[test]
    fn test_resizer_skips_within_threshold() {
        let mut config = config(Subprogram::Resizer);
        config.max_width = Some(800);
        let source = Path::new("a.jpg");

        let action = plan(&config, Some(&identity(800, 600, "jpeg", false)), source).unwrap();
        assert_eq!(
            action,
            Action::Skip(SkipReason::WithinMaxWidth { width: 800, max_width: 800 })
        );

        config.max_width = None;
        let action = plan(&config, Some(&identity(4000, 600, "jpeg", false)), source).unwrap();
        assert_eq!(action, Action::Skip(SkipReason::NoMaxWidth));
    }

    #[test]
    fn test_resizer_resizes_in_place() {
        let mut config = config(Subprogram::Resizer);
        config.max_width = Some(800);
        config.quality = Some(75);

        let action = plan(&config, Some(&identity(1200, 900, "jpeg", false)), Path::new("a.jpg")).unwrap();
        let Action::Resize(plan) = action else {
            panic!("expected resize, got {:?}", action);
        };
        assert!(plan.is_in_place());
        assert_eq!(plan.target_width, Some(800));
        assert_eq!(plan.convert_options().resize.as_deref(), Some("800"));
        assert_eq!(plan.convert_options().quality, Some(75));
    }

    #[test]
    fn test_missing_identity_never_acts() {
        for subprogram in [Subprogram::Resizer, Subprogram::ResizerDb, Subprogram::Pngquant, Subprogram::Png2jpeg] {
            let action = plan(&config(subprogram), None, Path::new("a.png")).unwrap();
            assert_eq!(action, Action::Skip(SkipReason::NotIdentified));
        }
    }

    #[test]
    fn test_resizer_db_width_priority() {
        let mut config = config(Subprogram::ResizerDb);
        config.max_width = Some(1000);
        config.size = Some(300);
        let scratch = Path::new("/tmp/run/scratch");

        let wide = plan(&config, Some(&identity(2000, 100, "jpeg", false)), scratch).unwrap();
        let Action::Resize(wide) = wide else { panic!() };
        assert_eq!(wide.target_width, Some(1000));
        assert_eq!(wide.destination, PathBuf::from("/tmp/run/scratch.jpeg"));

        let narrow = plan(&config, Some(&identity(500, 100, "jpeg", false)), scratch).unwrap();
        let Action::Resize(narrow) = narrow else { panic!() };
        assert_eq!(narrow.target_width, Some(300));

        config.size = None;
        let untouched = plan(&config, Some(&identity(500, 100, "jpeg", false)), scratch).unwrap();
        let Action::Resize(untouched) = untouched else { panic!() };
        assert_eq!(untouched.target_width, None);
    }

    #[test]
    fn test_resizer_db_format_and_quantize() {
        let mut config = config(Subprogram::ResizerDb);
        config.to_format = Some("png".to_string());
        config.optimize_png = true;
        config.monochrome = true;

        let action = plan(&config, Some(&identity(10, 10, "gif", false)), Path::new("s")).unwrap();
        let Action::Resize(plan) = action else { panic!() };
        assert_eq!(plan.output_format.as_deref(), Some("png"));
        assert_eq!(plan.destination, PathBuf::from("s.png"));
        assert!(plan.quantize);
        assert!(plan.monochrome);

        config.to_format = None;
        let action = super::plan(&config, Some(&identity(10, 10, "gif", false)), Path::new("s")).unwrap();
        let Action::Resize(plan) = action else { panic!() };
        assert_eq!(plan.output_format.as_deref(), Some("gif"));
        assert!(!plan.quantize);
    }

    #[test]
    fn test_pngquant_if_size() {
        let mut config = config(Subprogram::Pngquant);
        config.if_size = Some(FrameSize { width: 200, height: 100 });

        let action = plan(&config, Some(&identity(100, 100, "png", true)), Path::new("a.png")).unwrap();
        assert!(matches!(action, Action::Skip(SkipReason::SizeMismatch { .. })));

        let action = plan(&config, Some(&identity(200, 100, "png", true)), Path::new("a.png")).unwrap();
        assert_eq!(action, Action::Quantize { path: PathBuf::from("a.png") });

        config.if_size = None;
        let action = plan(&config, Some(&identity(1, 1, "png", false)), Path::new("a.png")).unwrap();
        assert!(matches!(action, Action::Quantize { .. }));
    }

    #[test]
    fn test_png2jpeg_if_opaque() {
        let mut config = config(Subprogram::Png2jpeg);
        config.if_opaque = true;

        let action = plan(&config, Some(&identity(10, 10, "png", true)), Path::new("a.png")).unwrap();
        assert_eq!(action, Action::Skip(SkipReason::Transparent));

        let action = plan(&config, Some(&identity(10, 10, "png", false)), Path::new("a.png")).unwrap();
        let Action::Convert(plan) = action else { panic!() };
        assert_eq!(plan.destination, PathBuf::from("a.png.jpg"));
        assert_eq!(plan.final_path(), Path::new("a.png.jpg"));
        assert!(!plan.is_in_place());

        config.if_opaque = false;
        config.keep_extension = true;
        let action = super::plan(&config, Some(&identity(10, 10, "png", true)), Path::new("a.png")).unwrap();
        let Action::Convert(plan) = action else { panic!() };
        assert_eq!(plan.final_path(), Path::new("a.png"));
        assert!(plan.is_in_place());
    }

    #[test]
    fn test_convert_destination() {
        let mut config = config(Subprogram::Convert);
        config.to_format = Some("webp".to_string());
        config.suffix = "_small".to_string();
        config.resize = Some("50%".to_string());

        let action = plan(&config, None, Path::new("dir/photo.png")).unwrap();
        let Action::Convert(plan) = action else { panic!() };
        assert_eq!(plan.destination, PathBuf::from("dir/photo_small.webp"));
        assert_eq!(plan.convert_options().resize.as_deref(), Some("50%"));

        config.to_format = None;
        assert!(super::plan(&config, None, Path::new("dir/photo.png")).is_err());
    }

    #[test]
    fn test_tint_carries_color() {
        let mut config = config(Subprogram::Tint);
        config.color = "#336699".to_string();
        let action = plan(&config, None, Path::new("icon.png")).unwrap();
        assert_eq!(
            action,
            Action::Tint { path: PathBuf::from("icon.png"), color: "#336699".to_string() }
        );
    }
}
