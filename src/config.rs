//! Compile options and target platform selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Platform {
    #[default]
    #[serde(rename = "web")]
    Web,
    #[serde(rename = "cross-platform", alias = "native", alias = "cross")]
    CrossPlatform,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::CrossPlatform => "cross-platform",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Platform::Web),
            "cross-platform" | "cross" | "native" => Ok(Platform::CrossPlatform),
            other => Err(format!(
                "unknown platform '{}', expected 'web' or 'cross-platform'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Overrides the document's own `platform` field when set.
    pub platform: Option<Platform>,
    /// Module providing `mergeStyles` / `matchFormat` to cross-platform output.
    pub runtime_module: String,
    pub component_dir: String,
    pub style_dir: String,
    /// Run per-component stages on the rayon pool.
    pub parallel: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            platform: None,
            runtime_module: "@uitree/runtime".to_string(),
            component_dir: "components".to_string(),
            style_dir: "styles".to_string(),
            parallel: true,
        }
    }
}

impl CompileOptions {
    pub fn for_platform(platform: Platform) -> Self {
        CompileOptions {
            platform: Some(platform),
            ..Default::default()
        }
    }

    /// Option override first, then the document, then web.
    pub fn resolve_platform(&self, document: Option<Platform>) -> Platform {
        self.platform.or(document).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("web".parse::<Platform>().unwrap(), Platform::Web);
        assert_eq!(
            "cross-platform".parse::<Platform>().unwrap(),
            Platform::CrossPlatform
        );
        assert!("desktop".parse::<Platform>().is_err());
    }

    #[test]
    fn test_options_from_partial_json() {
        let opts: CompileOptions =
            serde_json::from_str(r#"{"platform":"cross-platform","parallel":false}"#).unwrap();
        assert_eq!(opts.platform, Some(Platform::CrossPlatform));
        assert!(!opts.parallel);
        assert_eq!(opts.component_dir, "components");
    }

    #[test]
    fn test_platform_override_wins() {
        let opts = CompileOptions::for_platform(Platform::Web);
        assert_eq!(
            opts.resolve_platform(Some(Platform::CrossPlatform)),
            Platform::Web
        );
        let opts = CompileOptions::default();
        assert_eq!(
            opts.resolve_platform(Some(Platform::CrossPlatform)),
            Platform::CrossPlatform
        );
        assert_eq!(opts.resolve_platform(None), Platform::Web);
    }
}
