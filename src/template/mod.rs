//! Tag substitution for served HTML.
//!
//! ```text
//! {{key}}                                   value of `key`
//! {% if key %}A{% else %}B{% endif %}       A when `key` is non-empty
//! {% for item in items %}..{{item}}..{% endfor %}
//! ```
//!
//! Loops expand first, then conditionals, then placeholders. Unknown
//! placeholders are left as written; an unknown key in `if` is empty.
//! Blocks do not nest.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::TemplateConfig;

static RE_LOOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\{%[ \t]*for[ \t]+([A-Za-z0-9_]+)[ \t]+in[ \t]+items[ \t]*%\}",
        r"((?s:.*?))",
        r"\{%[ \t]*endfor[ \t]*%\}",
    ))
    .unwrap()
});

static RE_IF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\{%[ \t]*if[ \t]+([A-Za-z0-9_]+)[ \t]*%\}((?s:.*?))",
        r"(?:\{%[ \t]*else[ \t]*%\}((?s:.*?)))?",
        r"\{%[ \t]*endif[ \t]*%\}",
    ))
    .unwrap()
});

static RE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[ \t]*([A-Za-z0-9_]+)[ \t]*\}\}").unwrap());

/// Expand all tags in `input` with values from `config`.
pub fn render<'a>(input: &'a str, config: &TemplateConfig) -> Cow<'a, str> {
    if !input.contains("{{") && !input.contains("{%") {
        return Cow::Borrowed(input);
    }

    let looped = expand_loops(input, config);
    let branched = expand_conditionals(&looped, config);
    let substituted = substitute(&branched, |key| config.vars.get(key).map(String::as_str));
    Cow::Owned(substituted.into_owned())
}

fn expand_loops<'a>(input: &'a str, config: &TemplateConfig) -> Cow<'a, str> {
    RE_LOOP.replace_all(input, |caps: &Captures| {
        if caps[1] != *config.loop_key {
            return caps[0].to_string();
        }
        let body = &caps[2];
        config
            .items
            .iter()
            .map(|item| {
                let value = |key: &str| (key == config.loop_key).then_some(item.as_str());
                substitute(body, value).into_owned()
            })
            .collect::<String>()
    })
}

fn expand_conditionals<'a>(input: &'a str, config: &TemplateConfig) -> Cow<'a, str> {
    RE_IF.replace_all(input, |caps: &Captures| {
        let truthy = config.vars.get(&caps[1]).is_some_and(|v| !v.is_empty());
        let branch = if truthy { caps.get(2) } else { caps.get(3) };
        branch.map_or("", |m| m.as_str()).to_string()
    })
}

fn substitute<'a, 'v>(input: &'a str, lookup: impl Fn(&str) -> Option<&'v str>) -> Cow<'a, str> {
    RE_VAR.replace_all(input, |caps: &Captures| match lookup(&caps[1]) {
        Some(value) => value.to_string(),
        None => caps[0].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)], items: &[&str]) -> TemplateConfig {
        TemplateConfig {
            vars: vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            items: items.iter().map(|s| s.to_string()).collect(),
            ..TemplateConfig::default()
        }
    }

    #[test]
    fn test_placeholders() {
        let config = config(&[("title", "Home"), ("user", "ada")], &[]);
        assert_eq!(
            render("<h1>{{title}}</h1><p>{{ user }}</p>", &config),
            "<h1>Home</h1><p>ada</p>"
        );
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let config = config(&[], &[]);
        assert_eq!(render("{{missing}}", &config), "{{missing}}");
    }

    #[test]
    fn test_if_else() {
        let input = "{% if user %}Hi {{user}}{% else %}Sign in{% endif %}";
        assert_eq!(render(input, &config(&[("user", "ada")], &[])), "Hi ada");
        assert_eq!(render(input, &config(&[("user", "")], &[])), "Sign in");
        assert_eq!(render(input, &config(&[], &[])), "Sign in");
    }

    #[test]
    fn test_if_without_else() {
        let input = "a{% if beta %}<b>beta</b>{% endif %}z";
        assert_eq!(render(input, &config(&[("beta", "1")], &[])), "a<b>beta</b>z");
        assert_eq!(render(input, &config(&[], &[])), "az");
    }

    #[test]
    fn test_loop() {
        let input = "<ul>{% for item in items %}<li>{{item}}</li>{% endfor %}</ul>";
        assert_eq!(
            render(input, &config(&[], &["a", "b", "c"])),
            "<ul><li>a</li><li>b</li><li>c</li></ul>"
        );
        assert_eq!(render(input, &config(&[], &[])), "<ul></ul>");
    }

    #[test]
    fn test_loop_with_other_variable_is_kept() {
        let input = "{% for x in items %}{{x}}{% endfor %}";
        assert_eq!(render(input, &config(&[], &["a"])), input);
    }

    #[test]
    fn test_multiline_blocks() {
        let input = "{% if t %}\n<p>{{t}}</p>\n{% endif %}";
        assert_eq!(render(input, &config(&[("t", "x")], &[])), "\n<p>x</p>\n");
    }

    #[test]
    fn test_plain_html_is_borrowed() {
        let config = config(&[], &[]);
        assert!(matches!(render("<p>plain</p>", &config), Cow::Borrowed(_)));
    }
}
