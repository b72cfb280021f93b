//! Compiler configuration: a small struct with fluent `with_*` setters,
//! plus TOML-file loading.

use serde::{Deserialize, Serialize};

/// The class name used verbatim in the emitted class header and in every
/// qualified `invokestatic`/`getstatic`/`putstatic` name.
///
/// # Examples
///
/// ```
/// use stackc::config::CompilerConfig;
///
/// let cfg = CompilerConfig::default().with_class_name("MyProgram");
/// assert_eq!(cfg.class_name, "MyProgram");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub class_name: String,
}

impl CompilerConfig {
    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = name.into();
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid config: {e}"))
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig { class_name: "example".to_string() }
    }
}
