use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// One span of an edit script.
///
/// `old_text` is empty for inserts and `new_text` is empty for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOp {
    pub kind: OpKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub old_text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_text: String,
}

impl EditOp {
    pub fn equal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind: OpKind::Equal,
            old_text: text.clone(),
            new_text: text,
        }
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Insert,
            old_text: String::new(),
            new_text: text.into(),
        }
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Delete,
            old_text: text.into(),
            new_text: String::new(),
        }
    }

    pub fn replace(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Replace,
            old_text: old.into(),
            new_text: new.into(),
        }
    }

    /// Length of the span in the original-text coordinate space (chars).
    pub fn old_len(&self) -> usize {
        match self.kind {
            OpKind::Insert => 0,
            _ => self.old_text.chars().count(),
        }
    }

    /// Progress units this op contributes.
    pub fn work(&self) -> usize {
        match self.kind {
            OpKind::Equal | OpKind::Insert => self.new_text.chars().count(),
            OpKind::Delete => self.old_text.chars().count(),
            OpKind::Replace => self.old_text.chars().count() + self.new_text.chars().count(),
        }
    }

    pub fn is_change(&self) -> bool {
        self.kind != OpKind::Equal && (!self.old_text.is_empty() || !self.new_text.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeMode {
    #[default]
    Human,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    #[default]
    Fresh,
    Replace,
}

/// How Human mode removes text in Replace sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Extend a selection with Shift+Right per character, then one Delete.
    #[default]
    Select,
    /// One Delete keystroke per character.
    PerChar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingOptions {
    /// Words per minute (5 characters per word).
    pub speed: u32,
    pub variability: f64,
    pub typo_rate_percent: f64,
    pub start_delay_secs: u64,
    pub mode: TypeMode,
}

impl Default for TypingOptions {
    fn default() -> Self {
        Self {
            speed: 65,
            variability: 0.5,
            typo_rate_percent: 0.0,
            start_delay_secs: 3,
            mode: TypeMode::Human,
        }
    }
}

impl TypingOptions {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.speed == 0 {
            return Err(SessionError::Configuration(
                "speed must be greater than 0".to_string(),
            ));
        }
        if !self.variability.is_finite() || !(0.0..=1.0).contains(&self.variability) {
            return Err(SessionError::Configuration(
                "variability must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !self.typo_rate_percent.is_finite() || !(0.0..=50.0).contains(&self.typo_rate_percent)
        {
            return Err(SessionError::Configuration(
                "typo rate must be between 0 and 50 percent".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_bot(&self) -> bool {
        self.mode == TypeMode::Bot
    }
}

/// Everything a session needs, as handed over by the settings layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(flatten)]
    pub options: TypingOptions,
    pub kind: SessionKind,
    pub original_text: String,
    pub replacement_text: String,
    /// Where to start, in the original-text coordinate space.
    pub start_offset: usize,
    pub delete_strategy: DeleteStrategy,
}

impl SessionConfig {
    pub fn fresh(text: impl Into<String>, options: TypingOptions) -> Self {
        Self {
            options,
            kind: SessionKind::Fresh,
            original_text: text.into(),
            ..Default::default()
        }
    }

    pub fn replace(
        original: impl Into<String>,
        replacement: impl Into<String>,
        options: TypingOptions,
    ) -> Self {
        Self {
            options,
            kind: SessionKind::Replace,
            original_text: original.into(),
            replacement_text: replacement.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        self.options.validate()?;
        let blank = match self.kind {
            SessionKind::Fresh => self.original_text.trim().is_empty(),
            SessionKind::Replace => {
                self.original_text.trim().is_empty() && self.replacement_text.trim().is_empty()
            }
        };
        if blank {
            return Err(SessionError::EmptyInput);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_work_counts_touched_chars() {
        assert_eq!(EditOp::equal("abc").work(), 3);
        assert_eq!(EditOp::insert("ab").work(), 2);
        assert_eq!(EditOp::delete("abcd").work(), 4);
        assert_eq!(EditOp::replace("cat", "dogs").work(), 7);
        assert_eq!(EditOp::insert("ab").old_len(), 0);
        assert_eq!(EditOp::replace("é", "x").old_len(), 1);
    }

    #[test]
    fn rejects_invalid_options() {
        let mut options = TypingOptions {
            speed: 0,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(SessionError::Configuration(_))
        ));

        options.speed = 60;
        options.typo_rate_percent = 51.0;
        assert!(options.validate().is_err());

        options.typo_rate_percent = 50.0;
        options.variability = 1.5;
        assert!(options.validate().is_err());

        options.variability = 1.0;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn rejects_blank_input() {
        let cfg = SessionConfig::fresh("  \n\t", TypingOptions::default());
        assert!(matches!(cfg.validate(), Err(SessionError::EmptyInput)));

        let cfg = SessionConfig::replace(" ", "", TypingOptions::default());
        assert!(matches!(cfg.validate(), Err(SessionError::EmptyInput)));

        let cfg = SessionConfig::replace("", "new text", TypingOptions::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn session_config_reads_flat_settings_json() {
        let json = r#"{
            "speed": 90,
            "variability": 0.2,
            "typo_rate_percent": 3.5,
            "start_delay_secs": 0,
            "mode": "bot",
            "kind": "replace",
            "original_text": "a",
            "replacement_text": "b"
        }"#;
        let cfg: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.options.speed, 90);
        assert_eq!(cfg.options.mode, TypeMode::Bot);
        assert_eq!(cfg.kind, SessionKind::Replace);
        assert_eq!(cfg.delete_strategy, DeleteStrategy::Select);
        assert_eq!(cfg.start_offset, 0);
    }
}
