//! Declarative field rules and the walker that checks a JSON value against them.

use super::context::ValidationContext;
use serde_json::{Map, Value};

/// Constraint on a single JSON value
#[derive(Debug, Clone)]
pub enum Rule {
    String { max_len: usize },
    Integer { min: i64, max: i64 },
    Number { min: f64, max: f64 },
    Bool,
    Array { item: Box<Rule>, max_items: usize },
    Object(ObjectRule),
}

impl Rule {
    pub fn string(max_len: usize) -> Self {
        Rule::String { max_len }
    }

    pub fn int(min: i64, max: i64) -> Self {
        Rule::Integer { min, max }
    }

    pub fn number(min: f64, max: f64) -> Self {
        Rule::Number { min, max }
    }

    pub fn bool() -> Self {
        Rule::Bool
    }

    pub fn array(item: Rule, max_items: usize) -> Self {
        Rule::Array {
            item: Box::new(item),
            max_items,
        }
    }

    /// Check `value`, recording violations under the context's current path
    pub fn check(&self, value: &Value, ctx: &mut ValidationContext) {
        match self {
            Rule::String { max_len } => match value.as_str() {
                Some(s) if s.chars().count() > *max_len => {
                    ctx.fail(format!("must be at most {} characters", max_len))
                }
                Some(_) => {}
                None => ctx.fail(format!("expected string, found {}", kind_of(value))),
            },
            Rule::Integer { min, max } => match value.as_i64() {
                Some(n) if n < *min || n > *max => {
                    ctx.fail(format!("must be between {} and {}", min, max))
                }
                Some(_) => {}
                // 1920.0 is still an integer
                None => match value.as_f64() {
                    Some(n) if n.fract() == 0.0 && (*min as f64..=*max as f64).contains(&n) => {}
                    Some(n) if n.fract() == 0.0 => {
                        ctx.fail(format!("must be between {} and {}", min, max))
                    }
                    Some(_) => ctx.fail(format!(
                        "must be an integer between {} and {}",
                        min, max
                    )),
                    None => ctx.fail(format!("expected integer, found {}", kind_of(value))),
                },
            },
            Rule::Number { min, max } => match value.as_f64() {
                Some(n) if n < *min || n > *max => {
                    ctx.fail(format!("must be between {} and {}", min, max))
                }
                Some(_) => {}
                None => ctx.fail(format!("expected number, found {}", kind_of(value))),
            },
            Rule::Bool => {
                if !value.is_boolean() {
                    ctx.fail(format!("expected boolean, found {}", kind_of(value)));
                }
            }
            Rule::Array { item, max_items } => match value.as_array() {
                Some(items) if items.len() > *max_items => {
                    ctx.fail(format!("must contain at most {} items", max_items))
                }
                Some(items) => {
                    for (index, element) in items.iter().enumerate() {
                        ctx.enter_index(index);
                        item.check(element, ctx);
                        ctx.exit();
                    }
                }
                None => ctx.fail(format!("expected array, found {}", kind_of(value))),
            },
            Rule::Object(object) => match value.as_object() {
                Some(map) => object.check_map(map, ctx),
                None => ctx.fail(format!("expected object, found {}", kind_of(value))),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Field {
    name: &'static str,
    rule: Rule,
    required: bool,
}

/// Strict object shape: listed fields only, no additional properties.
#[derive(Debug, Clone, Default)]
pub struct ObjectRule {
    fields: Vec<Field>,
}

impl ObjectRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, rule: Rule) -> Self {
        self.fields.push(Field {
            name,
            rule,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, rule: Rule) -> Self {
        self.fields.push(Field {
            name,
            rule,
            required: false,
        });
        self
    }

    fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn check_map(&self, map: &Map<String, Value>, ctx: &mut ValidationContext) {
        for (key, value) in map {
            ctx.enter_key(key.as_str());
            match self.field(key) {
                Some(field) => field.rule.check(value, ctx),
                None => ctx.fail("unknown field"),
            }
            ctx.exit();
        }

        for field in self.fields.iter().filter(|f| f.required) {
            if !map.contains_key(field.name) {
                ctx.enter_key(field.name);
                ctx.fail("is required");
                ctx.exit();
            }
        }
    }
}

impl From<ObjectRule> for Rule {
    fn from(object: ObjectRule) -> Self {
        Rule::Object(object)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
