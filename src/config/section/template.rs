//! `[template]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [template]
//! enable = true
//! loop_key = "item"
//! items = ["one", "two"]
//!
//! [template.vars]
//! title = "My page"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Values substituted into served HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Process `{{ }}` and `{% %}` tags in HTML responses.
    pub enable: bool,

    /// `{{key}}` substitutions.
    pub vars: BTreeMap<String, String>,

    /// Loop variable name in `{% for <loop_key> in items %}`.
    pub loop_key: String,

    /// Values iterated by `for` blocks.
    pub items: Vec<String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            enable: true,
            vars: BTreeMap::new(),
            loop_key: "item".to_string(),
            items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_template_config() {
        let config = test_parse_config(
            "[template]\nitems = [\"a\", \"b\"]\n[template.vars]\ntitle = \"Home\"",
        );

        assert!(config.template.enable);
        assert_eq!(config.template.vars.get("title").map(String::as_str), Some("Home"));
        assert_eq!(config.template.loop_key, "item");
        assert_eq!(config.template.items, ["a", "b"]);
    }
}
