//! Conformance checks for [`Handler`] implementations.
//!
//! [`test_handler`] logs a fixed series of records through the handler,
//! then asks the caller for the written output as parsed JSON objects
//! (one per record, in order) and checks each against the expected shape.

use crate::handler::{Handler, Logger};
use crate::record::{Level, Record};
use crate::value::{Attr, LogValuer, Value};
use serde_json::{Map, Value as Json};
use std::sync::Arc;

/// One parsed output record.
pub type Output = Map<String, Json>;

/// Names of the built-in fields in the handler's output.
#[derive(Debug, Clone)]
pub struct Keys {
    pub time: String,
    pub level: String,
    pub message: String,
}

impl Default for Keys {
    fn default() -> Self {
        Keys {
            time: "time".to_string(),
            level: "level".to_string(),
            message: "message".to_string(),
        }
    }
}

type Check = Box<dyn Fn(&Output, &Keys) -> Option<String>>;

struct Case {
    name: &'static str,
    explanation: &'static str,
    run: fn(&Logger),
    checks: Vec<Check>,
}

struct Replace(&'static str);

impl LogValuer for Replace {
    fn log_value(&self) -> Value {
        Value::from(self.0)
    }
}

fn lookup<'a>(out: &'a Output, path: &[&str]) -> Option<&'a Json> {
    let (last, groups) = path.split_last()?;
    let mut map = out;
    for g in groups {
        map = map.get(*g)?.as_object()?;
    }
    map.get(*last)
}

fn has_key(path: &'static [&'static str]) -> Check {
    Box::new(move |out: &Output, _: &Keys| match lookup(out, path) {
        Some(_) => None,
        None => Some(format!("missing key {:?}", path)),
    })
}

fn missing_key(path: &'static [&'static str]) -> Check {
    Box::new(move |out: &Output, _: &Keys| match lookup(out, path) {
        Some(v) => Some(format!("unexpected key {:?} = {}", path, v)),
        None => None,
    })
}

fn has_attr(path: &'static [&'static str], want: &'static str) -> Check {
    Box::new(move |out: &Output, _: &Keys| match lookup(out, path) {
        Some(Json::String(s)) if s == want => None,
        Some(v) => Some(format!("{:?}: got {}, want {:?}", path, v, want)),
        None => Some(format!("missing key {:?}", path)),
    })
}

fn in_group(group: &'static str, check: Check) -> Check {
    Box::new(move |out: &Output, keys: &Keys| match out.get(group) {
        Some(Json::Object(inner)) => check(inner, keys),
        Some(v) => Some(format!("group {:?} is not an object: {}", group, v)),
        None => Some(format!("missing group {:?}", group)),
    })
}

fn has_builtins() -> Check {
    Box::new(|out: &Output, keys: &Keys| {
        for k in [&keys.time, &keys.level, &keys.message] {
            if !out.contains_key(k.as_str()) {
                return Some(format!("missing built-in key {:?}", k));
            }
        }
        None
    })
}

fn missing_time() -> Check {
    Box::new(|out: &Output, keys: &Keys| {
        out.contains_key(keys.time.as_str())
            .then(|| format!("unexpected time key {:?}", keys.time))
    })
}

/// Number of top-level keys besides the built-ins.
fn user_key_count(want: usize) -> Check {
    Box::new(move |out: &Output, keys: &Keys| {
        let n = out
            .keys()
            .filter(|k| **k != keys.time && **k != keys.level && **k != keys.message)
            .count();
        (n != want).then(|| format!("got {} top-level attributes, want {}", n, want))
    })
}

fn cases() -> Vec<Case> {
    vec![
        Case {
            name: "built-ins",
            explanation: "this test expects the time, level and message keys",
            run: |l| l.info("message", vec![]),
            checks: vec![has_builtins(), user_key_count(0)],
        },
        Case {
            name: "attrs",
            explanation: "a handler should output attributes passed to the logging function",
            run: |l| l.info("message", vec![Attr::new("k", "v")]),
            checks: vec![has_attr(&["k"], "v")],
        },
        Case {
            name: "WithAttrs",
            explanation: "a handler should include the attributes from with_attrs",
            run: |l| l.with(vec![Attr::new("a", "b")]).info("message", vec![Attr::new("k", "v")]),
            checks: vec![has_attr(&["a"], "b"), has_attr(&["k"], "v")],
        },
        Case {
            name: "groups",
            explanation: "a handler should handle group attributes",
            run: |l| {
                l.info(
                    "message",
                    vec![
                        Attr::new("a", "b"),
                        Attr::group("G", vec![Attr::new("c", "d")]),
                        Attr::new("e", "f"),
                    ],
                )
            },
            checks: vec![
                has_attr(&["a"], "b"),
                has_key(&["G"]),
                has_attr(&["G", "c"], "d"),
                has_attr(&["e"], "f"),
            ],
        },
        Case {
            name: "empty-attr",
            explanation: "a handler should ignore an empty attribute",
            run: |l| {
                l.info(
                    "message",
                    vec![Attr::new("a", "b"), Attr::default(), Attr::new("c", "d")],
                )
            },
            checks: vec![has_attr(&["a"], "b"), missing_key(&[""]), has_attr(&["c"], "d")],
        },
        Case {
            name: "zero-time",
            explanation: "a handler should ignore a missing record time",
            run: |l| {
                let record = Record::new(Level::INFO, "message").with_time(None);
                let _ = l.handler().handle(&record);
            },
            checks: vec![missing_time()],
        },
        Case {
            name: "WithGroup",
            explanation: "a handler should handle with_group",
            run: |l| l.with_group("G").info("message", vec![Attr::new("a", "b")]),
            checks: vec![has_attr(&["G", "a"], "b")],
        },
        Case {
            name: "multi-With",
            explanation: "a handler should handle multiple with_group and with_attrs calls",
            run: |l| {
                l.with(vec![Attr::new("a", "b")])
                    .with_group("G")
                    .with(vec![Attr::new("c", "d")])
                    .with_group("H")
                    .info("message", vec![Attr::new("e", "f")])
            },
            checks: vec![
                has_attr(&["a"], "b"),
                has_attr(&["G", "c"], "d"),
                has_attr(&["G", "H", "e"], "f"),
            ],
        },
        Case {
            name: "empty-group-record",
            explanation: "a handler should not output an empty group",
            run: |l| {
                l.info(
                    "message",
                    vec![Attr::new("a", "b"), Attr::group("G", vec![])],
                )
            },
            checks: vec![has_attr(&["a"], "b"), missing_key(&["G"])],
        },
        Case {
            name: "inline-group",
            explanation: "a handler should inline the members of a group with an empty key",
            run: |l| {
                l.info(
                    "message",
                    vec![
                        Attr::new("a", "b"),
                        Attr::group("", vec![Attr::new("c", "d")]),
                        Attr::new("e", "f"),
                    ],
                )
            },
            checks: vec![
                has_attr(&["a"], "b"),
                has_attr(&["c"], "d"),
                has_attr(&["e"], "f"),
                missing_key(&[""]),
            ],
        },
        Case {
            name: "nested-inline-group",
            explanation: "a handler should inline groups with empty keys at any depth",
            run: |l| {
                l.info(
                    "message",
                    vec![Attr::group(
                        "G",
                        vec![Attr::group("", vec![Attr::new("c", "d")])],
                    )],
                )
            },
            checks: vec![has_attr(&["G", "c"], "d"), in_group("G", missing_key(&[""]))],
        },
        Case {
            name: "WithGroup-empty-record",
            explanation: "a handler should not output groups if there are no attributes",
            run: |l| {
                l.with(vec![Attr::new("a", "b")])
                    .with_group("G")
                    .with(vec![Attr::new("c", "d")])
                    .with_group("H")
                    .info("message", vec![])
            },
            checks: vec![
                has_attr(&["a"], "b"),
                has_attr(&["G", "c"], "d"),
                missing_key(&["G", "H"]),
            ],
        },
        Case {
            name: "resolve",
            explanation: "a handler should call log_value on lazy values",
            run: |l| l.info("message", vec![Attr::valuer("k", Replace("replaced"))]),
            checks: vec![has_attr(&["k"], "replaced")],
        },
        Case {
            name: "resolve-groups",
            explanation: "a handler should call log_value on lazy values in groups",
            run: |l| {
                l.info(
                    "message",
                    vec![Attr::group(
                        "G",
                        vec![Attr::new("a", "v1"), Attr::valuer("b", Replace("v2"))],
                    )],
                )
            },
            checks: vec![has_attr(&["G", "a"], "v1"), has_attr(&["G", "b"], "v2")],
        },
        Case {
            name: "resolve-WithAttrs",
            explanation: "a handler should call log_value on lazy values from with_attrs",
            run: |l| {
                l.with(vec![Attr::valuer("k", Replace("replaced"))])
                    .info("message", vec![])
            },
            checks: vec![has_attr(&["k"], "replaced")],
        },
        Case {
            name: "resolve-WithAttrs-groups",
            explanation: "a handler should call log_value on lazy values in groups from with_attrs",
            run: |l| {
                l.with(vec![Attr::group(
                    "G",
                    vec![Attr::new("a", "v1"), Attr::valuer("b", Replace("v2"))],
                )])
                .info("message", vec![])
            },
            checks: vec![has_attr(&["G", "a"], "v1"), has_attr(&["G", "b"], "v2")],
        },
    ]
}

/// Run every conformance case against `handler`.
///
/// `results` is called once, after all records were logged, and must
/// return the written records in order. Built-in field names are taken
/// from `keys`.
///
/// **Returns**
/// - `Ok(())` if every check passed.
/// - `Err(failures)` with one description per failed check.
pub fn test_handler(
    handler: Arc<dyn Handler>,
    keys: &Keys,
    results: impl FnOnce() -> Vec<Output>,
) -> Result<(), Vec<String>> {
    let logger = Logger::from_handler(handler);
    let cases = cases();
    for case in &cases {
        (case.run)(&logger);
    }

    let outputs = results();
    if outputs.len() != cases.len() {
        return Err(vec![format!(
            "expected {} results, got {}",
            cases.len(),
            outputs.len()
        )]);
    }

    let mut failures = Vec::new();
    for (case, out) in cases.iter().zip(&outputs) {
        for check in &case.checks {
            if let Some(problem) = check(out, keys) {
                failures.push(format!("{}: {}: {}", case.name, case.explanation, problem));
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
