use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of transformation names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationName {
    Grayscale,
    Blur,
    EdgeDetect,
    Upscale,
    Resize,
    Rotate,
    Crop,
    BrightnessContrast,
    Denoise,
    Sketch,
    ColorFilter,
    Trim,
    ExtractAudio,
}

impl OperationName {
    pub const ALL: [OperationName; 13] = [
        OperationName::Grayscale,
        OperationName::Blur,
        OperationName::EdgeDetect,
        OperationName::Upscale,
        OperationName::Resize,
        OperationName::Rotate,
        OperationName::Crop,
        OperationName::BrightnessContrast,
        OperationName::Denoise,
        OperationName::Sketch,
        OperationName::ColorFilter,
        OperationName::Trim,
        OperationName::ExtractAudio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationName::Grayscale => "grayscale",
            OperationName::Blur => "blur",
            OperationName::EdgeDetect => "edge-detect",
            OperationName::Upscale => "upscale",
            OperationName::Resize => "resize",
            OperationName::Rotate => "rotate",
            OperationName::Crop => "crop",
            OperationName::BrightnessContrast => "brightness-contrast",
            OperationName::Denoise => "denoise",
            OperationName::Sketch => "sketch",
            OperationName::ColorFilter => "color-filter",
            OperationName::Trim => "trim",
            OperationName::ExtractAudio => "extract-audio",
        }
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = crate::error::UnknownOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| crate::error::UnknownOperationError::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_name() {
        for name in OperationName::ALL {
            assert_eq!(name.as_str().parse::<OperationName>().unwrap(), name);
        }
    }

    #[test]
    fn test_parse_accepts_underscores_and_case() {
        assert_eq!(
            "Edge_Detect".parse::<OperationName>().unwrap(),
            OperationName::EdgeDetect
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = "vignette".parse::<OperationName>().unwrap_err();
        assert_eq!(err.name, "vignette");
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&OperationName::BrightnessContrast).unwrap();
        assert_eq!(json, r#""brightness-contrast""#);
    }
}
