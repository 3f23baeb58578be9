//! Prompt templates and placeholder substitution.
//!
//! Recognised placeholders are `{{db_schema}}`, `{{dialect_name}}`,
//! `{{dialect_version}}` and `{{question}}`. Anything else between double
//! braces is left as written. Substitution is a single pass, so a value
//! that itself contains `{{…}}` is never expanded again.

use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::LazyLock;
use tessera_core::TemplateOverrides;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"));

pub const DEFAULT_SYSTEM: &str = "You are an expert {{dialect_name}} {{dialect_version}} \
developer. You answer questions by writing a single read-only SQL query against the \
database schema below and nothing else.\n\n{{db_schema}}";

pub const DEFAULT_ASSISTANT: &str = "Use only the tables and columns listed in the schema. \
Return the query inside a ```sql fenced block.";

pub const DEFAULT_HUMAN: &str = "{{question}}";

/// Values substituted into templates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateValues<'a> {
    pub db_schema: &'a str,
    pub dialect_name: &'a str,
    pub dialect_version: &'a str,
    pub question: &'a str,
}

impl TemplateValues<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "db_schema" => Some(self.db_schema),
            "dialect_name" => Some(self.dialect_name),
            "dialect_version" => Some(self.dialect_version),
            "question" => Some(self.question),
            _ => None,
        }
    }
}

/// Replace every recognised placeholder in `template`.
pub fn substitute(template: &str, values: &TemplateValues<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values
                .lookup(&caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// The three templates of the one-step pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub system: String,
    pub assistant: String,
    pub human: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            assistant: DEFAULT_ASSISTANT.to_string(),
            human: DEFAULT_HUMAN.to_string(),
        }
    }
}

impl Templates {
    /// Built-in templates with configured replacements applied.
    pub fn from_overrides(overrides: &TemplateOverrides) -> Self {
        let defaults = Self::default();
        Self {
            system: overrides.system.clone().unwrap_or(defaults.system),
            assistant: overrides.assistant.clone().unwrap_or(defaults.assistant),
            human: overrides.human.clone().unwrap_or(defaults.human),
        }
    }

    /// Render all three templates, as `(system, assistant, human)`.
    pub fn render(&self, values: &TemplateValues<'_>) -> (String, String, String) {
        (
            substitute(&self.system, values),
            substitute(&self.assistant, values),
            substitute(&self.human, values),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_placeholder_untouched() {
        let values = TemplateValues {
            db_schema: "S",
            ..Default::default()
        };
        assert_eq!(substitute("{{db_schema}}{{unknown}}", &values), "S{{unknown}}");
    }

    #[test]
    fn test_repeated_placeholders_all_substituted() {
        let values = TemplateValues {
            dialect_name: "sqlite",
            dialect_version: "3.45",
            ..Default::default()
        };
        assert_eq!(
            substitute("{{dialect_name}} {{dialect_version}} / {{dialect_name}}", &values),
            "sqlite 3.45 / sqlite"
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let values = TemplateValues {
            question: "what is {{db_schema}}?",
            db_schema: "SECRET",
            ..Default::default()
        };
        assert_eq!(substitute("Q: {{question}}", &values), "Q: what is {{db_schema}}?");
    }

    #[test]
    fn test_spaced_braces_are_not_placeholders() {
        let values = TemplateValues {
            question: "x",
            ..Default::default()
        };
        assert_eq!(substitute("{{ question }}", &values), "{{ question }}");
    }

    #[test]
    fn test_overrides_replace_only_given_templates() {
        let templates = Templates::from_overrides(&TemplateOverrides {
            human: Some("Question: {{question}}".to_string()),
            ..Default::default()
        });
        assert_eq!(templates.human, "Question: {{question}}");
        assert_eq!(templates.system, DEFAULT_SYSTEM);
    }

    #[test]
    fn test_default_system_template_embeds_schema() {
        let values = TemplateValues {
            db_schema: "CREATE TABLE Album (\n  AlbumId INTEGER\n);\n",
            dialect_name: "sqlite",
            dialect_version: "",
            question: "How many albums?",
        };
        let (system, _, human) = Templates::default().render(&values);
        assert!(system.contains("CREATE TABLE Album"));
        assert!(system.starts_with("You are an expert sqlite  developer."));
        assert_eq!(human, "How many albums?");
    }
}
