use crate::error::{ZError, ZResult};
use serde::{Deserialize, Serialize};

/// Tunables for one interpreter instance.
///
/// All fields have defaults, so a TOML document only needs the keys it
/// overrides:
///
/// ```toml
/// max_call_depth = 256
/// random_seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Routine frames allowed on the call stack before `CallDepthExceeded`
    pub max_call_depth: usize,
    /// Evaluation stack capacity in words, shared by all frames
    pub stack_capacity: usize,
    /// Snapshots retained by `save_undo`
    pub undo_slots: usize,
    /// Reject images whose header checksum disagrees with their contents
    pub strict_checksum: bool,
    /// Interpreter number declared in header byte 0x1E
    pub interpreter_number: u8,
    /// Interpreter version declared in header byte 0x1F
    pub interpreter_version: u8,
    pub screen_width: u8,
    pub screen_height: u8,
    /// Seed for a predictable random generator; `None` seeds from entropy
    pub random_seed: Option<u64>,
    /// Instructions executed per `run` call before yielding `InstructionLimit`
    pub instruction_limit: Option<u64>,
    /// Instructions an interrupt routine may run before it is abandoned
    pub timer_instruction_limit: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: 1024,
            stack_capacity: 16384,
            undo_slots: 8,
            strict_checksum: false,
            interpreter_number: 6,
            interpreter_version: b'Z',
            screen_width: 80,
            screen_height: 25,
            random_seed: None,
            instruction_limit: None,
            timer_instruction_limit: 100_000,
        }
    }
}

impl InterpreterConfig {
    pub fn from_toml_str(text: &str) -> ZResult<Self> {
        let config: InterpreterConfig =
            toml::from_str(text).map_err(|e| ZError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ZResult<()> {
        if self.max_call_depth == 0 {
            return Err(ZError::Config("max_call_depth must be at least 1".into()));
        }
        if self.stack_capacity == 0 {
            return Err(ZError::Config("stack_capacity must be at least 1".into()));
        }
        if self.timer_instruction_limit == 0 {
            return Err(ZError::Config(
                "timer_instruction_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Predictable configuration for tests and replays
    pub fn seeded(seed: u64) -> Self {
        InterpreterConfig {
            random_seed: Some(seed),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = InterpreterConfig::from_toml_str("").unwrap();
        assert_eq!(config, InterpreterConfig::default());
        assert_eq!(config.max_call_depth, 1024);
        assert_eq!(config.interpreter_version, b'Z');
    }

    #[test]
    fn test_partial_override() {
        let config = InterpreterConfig::from_toml_str(
            "max_call_depth = 32\nrandom_seed = 7\nscreen_width = 132\n",
        )
        .unwrap();
        assert_eq!(config.max_call_depth, 32);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.screen_width, 132);
        assert_eq!(config.undo_slots, 8);
    }

    #[test]
    fn test_rejects_zero_depth() {
        let err = InterpreterConfig::from_toml_str("max_call_depth = 0").unwrap_err();
        assert!(matches!(err, ZError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = InterpreterConfig::from_toml_str("max_call_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ZError::Config(_)));
    }
}
