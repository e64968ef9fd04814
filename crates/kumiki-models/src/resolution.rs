//! Output resolution parsing.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

static RESOLUTION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+)x(\d+)$").ok());

/// Pixel dimensions of the rendered video, written as `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `W:H` form used inside encoder filter expressions.
    pub fn as_filter_size(&self) -> String {
        format!("{}:{}", self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RESOLUTION_RE
            .as_ref()
            .and_then(|re| re.captures(s.trim()))
            .ok_or_else(|| ModelError::invalid_resolution(s))?;

        let width: u32 = caps[1].parse().map_err(|_| ModelError::invalid_resolution(s))?;
        let height: u32 = caps[2].parse().map_err(|_| ModelError::invalid_resolution(s))?;

        if width == 0 || height == 0 {
            return Err(ModelError::invalid_resolution(s));
        }

        Ok(Self { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        let res: Resolution = "1280x720".parse().unwrap();
        assert_eq!(res, Resolution::new(1280, 720));
        assert_eq!(res.to_string(), "1280x720");
        assert_eq!(res.as_filter_size(), "1280:720");
    }

    #[test]
    fn test_rejects_malformed_resolution() {
        assert!("1280".parse::<Resolution>().is_err());
        assert!("1280x".parse::<Resolution>().is_err());
        assert!("0x720".parse::<Resolution>().is_err());
        assert!("1280*720".parse::<Resolution>().is_err());
        assert!("wide".parse::<Resolution>().is_err());
    }
}
