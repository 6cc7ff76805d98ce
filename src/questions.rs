//! Question bank loading

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::config::ConfigError;

const DEFAULT_BANK: &str = include_str!("../data/questions.json");

/// A question as it appears in the bank file, before it gets an id
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QuestionSeed {
    pub theme: String,
    pub content: String,
}

/// The bank compiled into the binary
pub fn default_question_bank() -> Result<Vec<QuestionSeed>, ConfigError> {
    parse_question_bank(DEFAULT_BANK)
}

/// Load the bank from `path`, or the embedded one when no path is given
pub fn load_question_bank(path: Option<&Path>) -> Result<Vec<QuestionSeed>, ConfigError> {
    match path {
        Some(path) => {
            let raw =
                std::fs::read_to_string(path).map_err(|source| ConfigError::QuestionBankIo {
                    path: path.to_path_buf(),
                    source,
                })?;
            parse_question_bank(&raw)
        }
        None => default_question_bank(),
    }
}

pub fn parse_question_bank(raw: &str) -> Result<Vec<QuestionSeed>, ConfigError> {
    let seeds: Vec<QuestionSeed> = serde_json::from_str(raw)?;
    if seeds.is_empty() {
        return Err(ConfigError::QuestionBankInvalid(
            "no questions defined".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for seed in &seeds {
        if seed.theme.trim().is_empty() || seed.content.trim().is_empty() {
            return Err(ConfigError::QuestionBankInvalid(
                "every question needs a theme and content".to_string(),
            ));
        }
        if !seen.insert((seed.theme.as_str(), seed.content.as_str())) {
            return Err(ConfigError::QuestionBankInvalid(format!(
                "duplicate question: {}",
                seed.content
            )));
        }
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_bank_has_general_questions() {
        let bank = default_question_bank().unwrap();
        let general = bank.iter().filter(|q| q.theme == "general").count();
        assert!(general >= 10, "expected a usable general theme, got {}", general);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"theme": "space", "content": "Would you go to Mars?"}}]"#
        )
        .unwrap();

        let bank = load_question_bank(Some(file.path())).unwrap();
        assert_eq!(
            bank,
            vec![QuestionSeed {
                theme: "space".to_string(),
                content: "Would you go to Mars?".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = load_question_bank(Some(Path::new("/definitely/not/here.json")));
        assert!(matches!(result, Err(ConfigError::QuestionBankIo { .. })));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_banks() {
        assert!(parse_question_bank("[]").is_err());
        assert!(parse_question_bank(
            r#"[{"theme": "a", "content": "x"}, {"theme": "a", "content": "x"}]"#
        )
        .is_err());
        assert!(parse_question_bank(r#"[{"theme": " ", "content": "x"}]"#).is_err());
        assert!(parse_question_bank("not json").is_err());
    }
}
