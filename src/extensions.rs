use std::path::Path;

use crate::config::CollectionConfig;

/// Source file extensions counted by default
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    // C/C++
    ".c", ".cc", ".cpp", ".cxx", ".h", ".hh", ".hpp", ".hxx",
    // Objective-C / Swift
    ".m", ".mm", ".swift",
    // CUDA / OpenCL
    ".cu", ".cuh", ".cl",
    // JVM
    ".java", ".scala", ".kt", ".kts",
    ".go", ".rs",
    // Python
    ".py", ".pyi", ".pyx", ".pxd",
    // JavaScript / TypeScript
    ".js", ".mjs", ".cjs", ".jsx", ".ts", ".tsx", ".d.ts",
    ".lua", ".proto", ".thrift",
    // Assembly
    ".asm", ".s",
    ".r",
    // Ruby
    ".rb", ".rake", ".gemspec",
    ".php", ".phtml", ".cs",
    // Shell / Perl
    ".sh", ".bash", ".zsh", ".pl", ".pm",
];

/// Extensionless build files that are still worth counting
const EXTENSIONLESS_INCLUDES: &[&str] = &["Makefile", "Dockerfile", "Rakefile", "Gemfile", "CMakeLists"];

/// Decides which files the collector counts lines for
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    enabled: bool,
    allowed: Vec<String>,
}

impl ExtensionFilter {
    pub fn new(enabled: bool, allowed: &[String]) -> Self {
        Self {
            enabled,
            allowed: allowed.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &CollectionConfig) -> Self {
        Self::new(config.filter_by_extensions, &config.allowed_extensions)
    }

    /// Accepts everything
    pub fn disabled() -> Self {
        Self::new(false, &[])
    }

    pub fn should_include(&self, filename: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let basename = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if basename.starts_with('.') {
            return false;
        }

        if !basename.contains('.') {
            return EXTENSIONLESS_INCLUDES.contains(&&*basename);
        }

        let lower = basename.to_lowercase();
        self.allowed.iter().any(|ext| lower.ends_with(ext.as_str()))
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::from_config(&CollectionConfig::default())
    }
}

/// Lower-case extension including the dot, or "" when the name has none
pub fn extension_of(filename: &str) -> String {
    let basename = filename.rsplit('/').next().unwrap_or(filename);
    match basename.rfind('.') {
        Some(idx) if idx > 0 => basename[idx..].to_lowercase(),
        _ => String::new(),
    }
}
