//! Engine configuration.
//!
//! Loaded from RON. Every field has a default, so an empty `()` document is
//! a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result, ValidationError};
use crate::geometry::Board;

/// Tunables for session creation and command resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest allowed board side.
    pub min_board_side: u16,
    /// Largest allowed board side.
    pub max_board_side: u16,
    /// Reject commands whose kind is still on cooldown. Off by default:
    /// callers query [`Unit::can_execute`](crate::unit::Unit::can_execute)
    /// themselves.
    pub enforce_cooldowns: bool,
    /// Seed for unit placement and random commands. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_board_side: 4,
            max_board_side: 20,
            enforce_cooldowns: false,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from RON text and validate it.
    ///
    /// # Errors
    /// Returns [`GameError::Config`] if the text does not parse or the
    /// values are inconsistent.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a RON configuration file.
    ///
    /// # Errors
    /// Returns [`GameError::Config`] if the file cannot be read, does not
    /// parse, or is inconsistent.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GameError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_ron_str(&text)?;
        tracing::info!(
            path = %path.display(),
            min_board_side = config.min_board_side,
            max_board_side = config.max_board_side,
            enforce_cooldowns = config.enforce_cooldowns,
            "Loaded engine config"
        );
        Ok(config)
    }

    /// Every inconsistency in the configuration. Empty when valid.
    #[must_use]
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.min_board_side == 0 {
            errors.push("min_board_side must be at least 1".to_string());
        }
        if self.min_board_side > self.max_board_side {
            errors.push(format!(
                "min_board_side {} exceeds max_board_side {}",
                self.min_board_side, self.max_board_side
            ));
        }
        errors
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// Returns [`GameError::Config`] listing every problem found.
    pub fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GameError::Config(errors.join("; ")))
        }
    }

    /// Check board dimensions against the configured side bounds.
    ///
    /// # Errors
    /// Returns [`ValidationError::BoardSize`] when a side is out of bounds.
    pub fn check_board(&self, board: Board) -> std::result::Result<(), ValidationError> {
        let sides = self.min_board_side..=self.max_board_side;
        if sides.contains(&board.width) && sides.contains(&board.height) {
            Ok(())
        } else {
            Err(ValidationError::BoardSize {
                width: board.width,
                height: board.height,
                min: self.min_board_side,
                max: self.max_board_side,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.min_board_side, 4);
        assert_eq!(config.max_board_side, 20);
        assert!(!config.enforce_cooldowns);
        assert!(config.rng_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = EngineConfig::from_ron_str("(enforce_cooldowns: true, rng_seed: Some(7))").unwrap();
        assert!(config.enforce_cooldowns);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.max_board_side, 20);

        assert_eq!(EngineConfig::from_ron_str("()").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_inconsistent_bounds_rejected() {
        let err = EngineConfig::from_ron_str("(min_board_side: 12, max_board_side: 6)").unwrap_err();
        assert!(matches!(err, GameError::Config(_)));
        assert!(EngineConfig::from_ron_str("(min_board_side: oops)").is_err());
    }

    #[test]
    fn test_check_board() {
        let config = EngineConfig::default();
        assert!(config.check_board(Board::new(4, 20)).is_ok());
        assert!(matches!(
            config.check_board(Board::new(3, 8)),
            Err(ValidationError::BoardSize { width: 3, .. })
        ));
        assert!(config.check_board(Board::new(8, 21)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(max_board_side: 12)").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_board_side, 12);

        let missing = EngineConfig::load(Path::new("/definitely/not/here.ron"));
        assert!(matches!(missing, Err(GameError::Config(_))));
    }
}
