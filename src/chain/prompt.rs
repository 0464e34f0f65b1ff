//! `{variable}` prompt templates rendered from chain inputs

use crate::chain::ChainInputs;
use crate::error::Error;

/// A prompt template with `{variable}` placeholders
///
/// `{{` and `}}` escape literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Variable names referenced by the template, in order of first use
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '{' {
                continue;
            }
            if chars.peek() == Some(&'{') {
                chars.next();
                continue;
            }
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if !name.is_empty() && !vars.contains(&name) {
                vars.push(name);
            }
        }

        vars
    }

    /// Substitute placeholders from `inputs`
    ///
    /// Non-string JSON values are rendered in their compact JSON form. A
    /// placeholder with no matching input is a `MissingInput` error.
    pub fn render(&self, inputs: &ChainInputs) -> Result<String, Error> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                    let value = inputs
                        .get(&name)
                        .ok_or_else(|| Error::MissingInput(name.clone()))?;
                    match value.as_str() {
                        Some(s) => out.push_str(s),
                        None => out.push_str(&value.to_string()),
                    }
                }
                c => out.push(c),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(pairs: &[(&str, serde_json::Value)]) -> ChainInputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_variables() {
        let tpl = PromptTemplate::new("Answer {question} as {persona}.");
        let rendered = tpl
            .render(&inputs(&[
                ("question", json!("why is the sky blue")),
                ("persona", json!("a physicist")),
            ]))
            .unwrap();
        assert_eq!(rendered, "Answer why is the sky blue as a physicist.");
    }

    #[test]
    fn test_render_missing_variable() {
        let tpl = PromptTemplate::new("Hello {name}");
        let result = tpl.render(&ChainInputs::new());
        assert!(matches!(result, Err(Error::MissingInput(key)) if key == "name"));
    }

    #[test]
    fn test_render_escaped_braces() {
        let tpl = PromptTemplate::new("literal {{braces}} and {var}");
        let rendered = tpl.render(&inputs(&[("var", json!("x"))])).unwrap();
        assert_eq!(rendered, "literal {braces} and x");
    }

    #[test]
    fn test_render_non_string_value() {
        let tpl = PromptTemplate::new("count: {n}");
        let rendered = tpl.render(&inputs(&[("n", json!(3))])).unwrap();
        assert_eq!(rendered, "count: 3");
    }

    #[test]
    fn test_variables_deduplicated_in_order() {
        let tpl = PromptTemplate::new("{a} {b} {a} {{not_a_var}}");
        assert_eq!(tpl.variables(), vec!["a".to_string(), "b".to_string()]);
    }
}
