//! # Tool Path Resolver
//!
//! Trova i binari esterni usati dal bridge (ImageMagick, pngquant, touch).
//!
//! ## Strategia:
//! 1. `MAGO_TOOLS_DIR`: directory esplicita, ha sempre la priorità
//! 2. `PATH` di sistema
//!
//! ImageMagick 7 espone un unico binario `magick` con sottocomandi; la
//! versione 6 usa `convert` e `identify` separati. `ImageMagick::detect`
//! sceglie la prima disponibile.

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at a directory of bundled tools
pub const TOOLS_DIR_ENV: &str = "MAGO_TOOLS_DIR";

/// Locates external binaries
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    tools_dir: Option<PathBuf>,
}

impl ToolResolver {
    /// Resolver honouring `MAGO_TOOLS_DIR`
    pub fn from_env() -> Self {
        let tools_dir = env::var_os(TOOLS_DIR_ENV)
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());
        debug!("Tools directory: {:?}", tools_dir);
        Self { tools_dir }
    }

    /// Resolver looking only in the given directory, then `PATH`
    pub fn with_tools_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(dir.into()),
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        if let Some(ref dir) = self.tools_dir {
            let bundled = dir.join(executable_name(tool_name));
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        let found = self.find_in_system_path(tool_name);
        debug!("Resolved {} -> {:?}", tool_name, found);
        found
    }

    /// Find tool in system PATH
    fn find_in_system_path(&self, tool_name: &str) -> Option<PathBuf> {
        let name = executable_name(tool_name);
        env::split_paths(&env::var_os("PATH")?)
            .map(|dir| dir.join(&name))
            .find(|path| path.is_file())
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// Resolved path or the bare name, letting the OS report a missing binary
    pub fn command_path(&self, tool_name: &str) -> PathBuf {
        self.resolve_tool(tool_name)
            .unwrap_or_else(|| PathBuf::from(tool_name))
    }

    /// Error message telling the operator how to get a missing tool
    pub fn install_hint(tool_name: &str) -> String {
        let package = match tool_name {
            "magick" | "convert" | "identify" => "imagemagick",
            "pngquant" => "pngquant",
            "touch" => "coreutils",
            other => other,
        };
        format!(
            "'{}' not found in {} or PATH (install the '{}' package)",
            tool_name, TOOLS_DIR_ENV, package
        )
    }
}

fn executable_name(tool_name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool_name)
    } else {
        tool_name.to_string()
    }
}

/// How ImageMagick has to be invoked on this system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageMagick {
    /// ImageMagick 7: `magick <input> ... <output>` and `magick identify`
    V7(PathBuf),
    /// ImageMagick 6: standalone `convert` and `identify`
    Legacy { convert: PathBuf, identify: PathBuf },
}

impl ImageMagick {
    /// Pick the ImageMagick flavour available through `resolver`
    pub fn detect(resolver: &ToolResolver) -> Option<Self> {
        if let Some(magick) = resolver.resolve_tool("magick") {
            return Some(Self::V7(magick));
        }
        match (resolver.resolve_tool("convert"), resolver.resolve_tool("identify")) {
            (Some(convert), Some(identify)) => Some(Self::Legacy { convert, identify }),
            _ => None,
        }
    }

    /// Program and leading arguments for a conversion
    pub fn convert_command(&self) -> (&Path, Vec<String>) {
        match self {
            Self::V7(magick) => (magick, Vec::new()),
            Self::Legacy { convert, .. } => (convert, Vec::new()),
        }
    }

    /// Program and leading arguments for identify
    pub fn identify_command(&self) -> (&Path, Vec<String>) {
        match self {
            Self::V7(magick) => (magick, vec!["identify".to_string()]),
            Self::Legacy { identify, .. } => (identify, Vec::new()),
        }
    }
}
