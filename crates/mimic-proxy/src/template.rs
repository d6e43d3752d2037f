//! Template expansion for `responsetype=mockjs` rules.
//!
//! Property names carry generation directives (`"msg|3"`, `"score|1-100"`,
//! `"price|1-10.2"`), and string values may embed `@placeholder` generators
//! (`"@name"`, `"@integer(1,100)"`). The expander walks a JSON template and
//! materializes concrete data.
//!
//! Unknown directives and placeholders fail closed: the literal value is
//! emitted unchanged and the miss is logged, never guessed at.

use std::collections::HashMap;
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"@([a-zA-Z]+)(?:\(([^)]*)\))?").unwrap())
}

/// Integer part of a key directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntSpec {
    Count(u64),
    Range(u64, u64),
    Step(i64),
}

/// Parsed `name|rule` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyRule {
    int: IntSpec,
    /// Decimal places for float generation, `dmin..=dmax`.
    decimals: Option<(u32, u32)>,
}

/// Seedable template expander.
///
/// All randomness flows through the owned RNG, so two expanders built with
/// the same seed produce identical output for identical templates.
pub struct Expander {
    rng: StdRng,
    /// Running values for `|+step` directives, keyed by property name.
    counters: HashMap<String, i64>,
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

impl Expander {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            counters: HashMap::new(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            counters: HashMap::new(),
        }
    }

    pub fn expand(&mut self, template: &Value) -> Value {
        match template {
            Value::Object(map) => self.expand_object(map),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.expand(v)).collect()),
            Value::String(s) => self.expand_string(s),
            other => other.clone(),
        }
    }

    fn expand_object(&mut self, map: &Map<String, Value>) -> Value {
        let mut out = Map::new();
        for (key, value) in map {
            match parse_key(key) {
                Some((name, rule)) => {
                    let expanded = self.apply_rule(name, rule, value);
                    out.insert(name.to_string(), expanded);
                }
                None => {
                    out.insert(key.clone(), self.expand(value));
                }
            }
        }
        Value::Object(out)
    }

    fn apply_rule(&mut self, name: &str, rule: KeyRule, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                let n = self.resolve_count(name, rule.int);
                self.expand_string(&s.repeat(n as usize))
            }
            Value::Number(num) => self.apply_number_rule(name, rule, num),
            Value::Bool(b) => match rule.int {
                IntSpec::Range(min, max) if min + max > 0 => {
                    // `value` with probability min/(min+max), else its negation.
                    if self.rng.gen_ratio(min as u32, (min + max) as u32) {
                        Value::Bool(*b)
                    } else {
                        Value::Bool(!*b)
                    }
                }
                _ => Value::Bool(self.rng.gen()),
            },
            Value::Array(items) => self.apply_array_rule(name, rule, items),
            Value::Object(inner) => self.apply_object_rule(rule, inner),
            Value::Null => Value::Null,
        }
    }

    fn apply_number_rule(&mut self, name: &str, rule: KeyRule, num: &serde_json::Number) -> Value {
        if let IntSpec::Step(step) = rule.int {
            let start = num.as_i64().unwrap_or(0);
            let current = *self.counters.entry(name.to_string()).or_insert(start);
            self.counters.insert(name.to_string(), current + step);
            return Value::from(current);
        }

        let int_part = self.resolve_count(name, rule.int);
        match rule.decimals {
            Some((dmin, dmax)) => {
                let places = self.rng.gen_range(dmin..=dmax.max(dmin));
                let mut digits = String::new();
                for _ in 0..places.max(1) {
                    digits.push(char::from(b'0' + self.rng.gen_range(0..10u8)));
                }
                format!("{int_part}.{digits}")
                    .parse::<f64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::from(int_part))
            }
            None => Value::from(int_part),
        }
    }

    fn apply_array_rule(&mut self, name: &str, rule: KeyRule, items: &[Value]) -> Value {
        if items.is_empty() {
            return Value::Array(Vec::new());
        }
        match rule.int {
            // Sequential pick across expansions.
            IntSpec::Step(step) => {
                let counter = self.counters.entry(name.to_string()).or_insert(0);
                let index = (counter.unsigned_abs() as usize) % items.len();
                *counter += step;
                self.expand(&items[index])
            }
            // Pick one element at random.
            IntSpec::Count(1) => {
                let index = self.rng.gen_range(0..items.len());
                self.expand(&items[index])
            }
            // Repeat the whole array n times.
            _ => {
                let n = self.resolve_count(name, rule.int);
                let mut out = Vec::with_capacity(items.len() * n as usize);
                for _ in 0..n {
                    for item in items {
                        out.push(self.expand(item));
                    }
                }
                Value::Array(out)
            }
        }
    }

    fn apply_object_rule(&mut self, rule: KeyRule, inner: &Map<String, Value>) -> Value {
        let n = match rule.int {
            IntSpec::Count(c) => c,
            IntSpec::Range(min, max) => self.rng.gen_range(min..=max.max(min)),
            IntSpec::Step(_) => inner.len() as u64,
        }
        .min(inner.len() as u64) as usize;

        let keys: Vec<&String> = inner.keys().collect();
        let chosen = rand::seq::index::sample(&mut self.rng, keys.len(), n);
        let mut indices: Vec<usize> = chosen.into_iter().collect();
        indices.sort_unstable();

        let mut out = Map::new();
        for index in indices {
            let key = keys[index];
            match parse_key(key) {
                Some((name, inner_rule)) => {
                    let expanded = self.apply_rule(name, inner_rule, &inner[key.as_str()]);
                    out.insert(name.to_string(), expanded);
                }
                None => {
                    let expanded = self.expand(&inner[key.as_str()]);
                    out.insert(key.clone(), expanded);
                }
            }
        }
        Value::Object(out)
    }

    fn resolve_count(&mut self, name: &str, spec: IntSpec) -> u64 {
        match spec {
            IntSpec::Count(c) => c,
            IntSpec::Range(min, max) => self.rng.gen_range(min..=max.max(min)),
            IntSpec::Step(step) => {
                let counter = self.counters.entry(name.to_string()).or_insert(1);
                let current = *counter;
                *counter += step;
                current.max(0) as u64
            }
        }
    }

    fn expand_string(&mut self, input: &str) -> Value {
        let regex = placeholder_regex();

        // A string that is exactly one placeholder keeps the generated type.
        if let Some(caps) = regex.captures(input) {
            let whole = caps.get(0).map(|m| m.as_str() == input).unwrap_or(false);
            if whole {
                if let Some(value) = self.generate(&caps[1], caps.get(2).map(|m| m.as_str())) {
                    return value;
                }
                warn!(placeholder = &caps[1], "unsupported template placeholder, emitting literal");
                return Value::String(input.to_string());
            }
        }

        if !regex.is_match(input) {
            return Value::String(input.to_string());
        }

        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for caps in regex.captures_iter(input) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&input[last..whole.start()]);
            match self.generate(&caps[1], caps.get(2).map(|m| m.as_str())) {
                Some(value) => match value {
                    Value::String(s) => out.push_str(&s),
                    other => out.push_str(&other.to_string()),
                },
                None => {
                    warn!(placeholder = &caps[1], "unsupported template placeholder, emitting literal");
                    out.push_str(whole.as_str());
                }
            }
            last = whole.end();
        }
        out.push_str(&input[last..]);
        Value::String(out)
    }

    fn generate(&mut self, name: &str, args: Option<&str>) -> Option<Value> {
        let args: Vec<i64> = args
            .unwrap_or("")
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect();
        let arg = |index: usize, fallback: i64| args.get(index).copied().unwrap_or(fallback);

        let value = match name.to_ascii_lowercase().as_str() {
            "natural" => {
                let (min, max) = ordered(arg(0, 0), arg(1, 1_000_000));
                Value::from(self.rng.gen_range(min..=max))
            }
            "integer" | "int" => {
                let (min, max) = ordered(arg(0, -1_000_000), arg(1, 1_000_000));
                Value::from(self.rng.gen_range(min..=max))
            }
            "float" => {
                let (min, max) = ordered(arg(0, 0), arg(1, 1000));
                let int_part = self.rng.gen_range(min..=max);
                let frac = self.rng.gen_range(0..10_000u32);
                format!("{int_part}.{frac:04}").parse::<f64>().map(Value::from).ok()?
            }
            "boolean" | "bool" => Value::Bool(self.rng.gen()),
            "string" => {
                let (min, max) = ordered(arg(0, 5).max(0), arg(1, 10).max(0));
                let len = self.rng.gen_range(min..=max) as usize;
                Value::String(self.letters(len.max(1)))
            }
            "word" => {
                let len = self.rng.gen_range(3..=10);
                Value::String(self.letters(len))
            }
            "title" => {
                let count = self.rng.gen_range(3..=7);
                let words: Vec<String> =
                    (0..count).map(|_| capitalize(&self.word())).collect();
                Value::String(words.join(" "))
            }
            "sentence" => Value::String(self.sentence()),
            "paragraph" => {
                let count = self.rng.gen_range(3..=7);
                let sentences: Vec<String> = (0..count).map(|_| self.sentence()).collect();
                Value::String(sentences.join(" "))
            }
            "first" => Value::String(self.pick(FIRST_NAMES).to_string()),
            "last" => Value::String(self.pick(LAST_NAMES).to_string()),
            "name" => {
                let first = self.pick(FIRST_NAMES);
                let last = self.pick(LAST_NAMES);
                Value::String(format!("{first} {last}"))
            }
            "email" => {
                let user = self.word();
                let host = self.word();
                let tld = self.pick(TLDS);
                Value::String(format!("{user}@{host}.{tld}"))
            }
            "domain" => {
                let host = self.word();
                let tld = self.pick(TLDS);
                Value::String(format!("{host}.{tld}"))
            }
            "url" => {
                let host = self.word();
                let tld = self.pick(TLDS);
                let path = self.word();
                Value::String(format!("http://{host}.{tld}/{path}"))
            }
            "ip" => {
                let octets: Vec<String> = (0..4)
                    .map(|_| self.rng.gen_range(0..=255u8).to_string())
                    .collect();
                Value::String(octets.join("."))
            }
            "guid" => {
                let hex: String = (0..32)
                    .map(|_| char::from_digit(self.rng.gen_range(0..16u32), 16).unwrap_or('0'))
                    .collect();
                Value::String(format!(
                    "{}-{}-{}-{}-{}",
                    &hex[0..8],
                    &hex[8..12],
                    &hex[12..16],
                    &hex[16..20],
                    &hex[20..32]
                ))
            }
            "id" => {
                let digits: String = (0..18)
                    .map(|_| char::from(b'0' + self.rng.gen_range(0..10u8)))
                    .collect();
                Value::String(digits)
            }
            "date" => Value::String(self.timestamp().format("%Y-%m-%d").to_string()),
            "time" => Value::String(self.timestamp().format("%H:%M:%S").to_string()),
            "datetime" => {
                Value::String(self.timestamp().format("%Y-%m-%d %H:%M:%S").to_string())
            }
            "color" => Value::String(format!("#{:06x}", self.rng.gen_range(0..0x1000000u32))),
            _ => return None,
        };
        Some(value)
    }

    fn timestamp(&mut self) -> chrono::DateTime<chrono::Utc> {
        let secs = self.rng.gen_range(0..=1_900_000_000i64);
        chrono::DateTime::from_timestamp(secs, 0).unwrap_or(chrono::DateTime::UNIX_EPOCH)
    }

    fn letters(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'a' + self.rng.gen_range(0..26u8)))
            .collect()
    }

    fn word(&mut self) -> String {
        let len = self.rng.gen_range(3..=8);
        self.letters(len)
    }

    fn sentence(&mut self) -> String {
        let count = self.rng.gen_range(12..=18);
        let words: Vec<String> = (0..count).map(|_| self.word()).collect();
        format!("{}.", capitalize(&words.join(" ")))
    }

    fn pick<'a>(&mut self, pool: &[&'a str]) -> &'a str {
        pool[self.rng.gen_range(0..pool.len())]
    }
}

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "John", "Linda", "Robert", "Susan", "Michael", "Karen", "William", "Nancy",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Garcia", "Wilson",
];
const TLDS: &[&str] = &["com", "net", "org", "io", "dev"];

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Split `name|rule` and parse the rule. `None` means the key carries no
/// directive (or an unparseable one) and must be used literally.
fn parse_key(key: &str) -> Option<(&str, KeyRule)> {
    let (name, rule_str) = key.rsplit_once('|')?;
    if name.is_empty() || rule_str.is_empty() {
        return None;
    }

    let rule = parse_rule(rule_str);
    if rule.is_none() {
        warn!(key, "unsupported template directive, emitting literal");
    }
    rule.map(|rule| (name, rule))
}

fn parse_rule(rule_str: &str) -> Option<KeyRule> {
    if let Some(step_str) = rule_str.strip_prefix('+') {
        let step: i64 = step_str.parse().ok()?;
        return Some(KeyRule {
            int: IntSpec::Step(step),
            decimals: None,
        });
    }

    let (int_str, dec_str) = match rule_str.split_once('.') {
        Some((int, dec)) => (int, Some(dec)),
        None => (rule_str, None),
    };

    let int = parse_span(int_str).map(|(min, max)| {
        if min == max {
            IntSpec::Count(min)
        } else {
            IntSpec::Range(min, max)
        }
    })?;

    let decimals = match dec_str {
        Some(dec) => {
            let (dmin, dmax) = parse_span(dec)?;
            Some((dmin as u32, dmax as u32))
        }
        None => None,
    };

    Some(KeyRule { int, decimals })
}

/// `"3"` → (3, 3); `"1-10"` → (1, 10).
fn parse_span(span: &str) -> Option<(u64, u64)> {
    match span.split_once('-') {
        Some((min, max)) => {
            let min: u64 = min.parse().ok()?;
            let max: u64 = max.parse().ok()?;
            Some((min, max))
        }
        None => {
            let count: u64 = span.parse().ok()?;
            Some((count, count))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_repeats_array() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"code": 200, "msg|3": ["mock response"]}));
        assert_eq!(
            out,
            json!({"code": 200, "msg": ["mock response", "mock response", "mock response"]})
        );
    }

    #[test]
    fn test_count_repeats_string() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"stars|4": "*"}));
        assert_eq!(out, json!({"stars": "****"}));
    }

    #[test]
    fn test_range_generates_number_within_bounds() {
        let mut expander = Expander::seeded(7);
        for _ in 0..20 {
            let out = expander.expand(&json!({"score|1-100": 0}));
            let score = out["score"].as_u64().unwrap();
            assert!((1..=100).contains(&score));
        }
    }

    #[test]
    fn test_float_directive_has_decimals() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"price|1-10.2": 0}));
        assert!(out["price"].is_f64() || out["price"].is_u64());
        let price = out["price"].as_f64().unwrap();
        assert!(price < 11.0);
    }

    #[test]
    fn test_step_increments_within_expansion() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"list|3": [{"id|+1": 100}]}));
        let ids: Vec<i64> = out["list"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![100, 101, 102]);
    }

    #[test]
    fn test_array_pick_one() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"pick|1": ["a", "b", "c"]}));
        let picked = out["pick"].as_str().unwrap();
        assert!(["a", "b", "c"].contains(&picked));
    }

    #[test]
    fn test_object_property_pick() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"flags|2": {"a": 1, "b": 2, "c": 3}}));
        assert_eq!(out["flags"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_placeholder_whole_string_keeps_type() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"n": "@integer(1,5)"}));
        let n = out["n"].as_i64().unwrap();
        assert!((1..=5).contains(&n));
    }

    #[test]
    fn test_placeholder_interpolated_into_string() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"greeting": "hello @first!"}));
        let greeting = out["greeting"].as_str().unwrap();
        assert!(greeting.starts_with("hello "));
        assert!(greeting.ends_with('!'));
        assert!(!greeting.contains('@'));
    }

    #[test]
    fn test_unknown_placeholder_emits_literal() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"v": "@definitelynotreal"}));
        assert_eq!(out["v"], "@definitelynotreal");
    }

    #[test]
    fn test_unknown_directive_key_kept_literal() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"weird|abc": "x"}));
        assert_eq!(out["weird|abc"], "x");
    }

    #[test]
    fn test_identical_seeds_are_deterministic() {
        let template = json!({
            "id": "@guid",
            "user": {"name": "@name", "score|1-1000": 0},
            "tags|2-5": ["@word"]
        });
        let a = Expander::seeded(42).expand(&template);
        let b = Expander::seeded(42).expand(&template);
        assert_eq!(a, b);
    }

    #[test]
    fn test_guid_shape() {
        let mut expander = Expander::seeded(7);
        let out = expander.expand(&json!({"g": "@guid"}));
        let guid = out["g"].as_str().unwrap();
        assert_eq!(guid.len(), 36);
        assert_eq!(guid.matches('-').count(), 4);
    }

    #[test]
    fn test_boolean_weighting_all_weight_keeps_value() {
        // min/(min+max) with max=0 keeps the template value always.
        let mut expander = Expander::seeded(7);
        for _ in 0..10 {
            let out = expander.expand(&json!({"flag|1-0": true}));
            assert_eq!(out["flag"], true);
        }
    }
}
