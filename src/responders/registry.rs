//! # Responder registry: glob pattern → ordered responders.
//!
//! The registry is assembled once with a [`RegistryBuilder`] and frozen by
//! [`RegistryBuilder::build`] into a read-only [`Registry`]. Every execution unit receives
//! the same `Arc<Registry>` at spawn time, so the `(pattern, responder_index)` of a
//! [`WorkItem`] resolves to the same responder wherever it is popped.
//!
//! ## Matching
//! Patterns use shell-style globbing via [`glob::Pattern`] with default options:
//! - `*` matches any run of characters, dots included (`user.*` matches `user.a.b`)
//! - `?` matches one character, `[...]` a character class
//! - matching is case-sensitive and anchored to the full event name
//!
//! Patterns are normalized to shell-wildcard rules before compiling: a run of `*`
//! (`**`, `***`) is one `*`, and a `[` with no closing `]` is a literal bracket.
//!
//! ## Fan-out
//! ```text
//! event "user.created"
//!   ├─ "user.*"        → [A, C]  → WorkItem(user.*, 0), WorkItem(user.*, 1)
//!   ├─ "user.created"  → [B]     → WorkItem(user.created, 0)
//!   └─ "order.*"       → [D]     → (no match)
//! ```

use std::collections::HashMap;

use glob::Pattern;

use crate::error::RegistryError;
use crate::marshal::Payload;
use crate::queue::WorkItem;
use crate::responders::responder::{Call, ResponderRef};

/// A responder bound under a pattern.
#[derive(Clone)]
pub struct Responder {
    handler: ResponderRef,
    pass_event_name: bool,
}

impl Responder {
    /// Returns the handler.
    pub fn handler(&self) -> &ResponderRef {
        &self.handler
    }

    /// True if the handler receives the matched event name.
    pub fn pass_event_name(&self) -> bool {
        self.pass_event_name
    }

    /// Builds the call for one work item.
    pub(crate) fn call_for(&self, item: &WorkItem) -> Call {
        Call {
            event_name: self
                .pass_event_name
                .then(|| item.event_name.as_str().into()),
            payload: item.payload.clone(),
        }
    }
}

struct Route {
    source: String,
    glob: Pattern,
    responders: Vec<Responder>,
}

/// Mutable registry used before anything starts.
#[derive(Default)]
pub struct RegistryBuilder {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `responder` under `pattern`; the handler receives the payload only.
    ///
    /// Returns the same handle so the call site keeps a usable reference.
    pub fn respond_to(
        &mut self,
        pattern: &str,
        responder: ResponderRef,
    ) -> Result<ResponderRef, RegistryError> {
        self.register(pattern, responder, false)
    }

    /// Registers `responder` under `pattern`; the handler also receives the event name.
    pub fn respond_to_named(
        &mut self,
        pattern: &str,
        responder: ResponderRef,
    ) -> Result<ResponderRef, RegistryError> {
        self.register(pattern, responder, true)
    }

    /// Registers `responder` under `pattern`.
    ///
    /// Several responders may share a pattern; all are kept in registration order.
    pub fn register(
        &mut self,
        pattern: &str,
        responder: ResponderRef,
        pass_event_name: bool,
    ) -> Result<ResponderRef, RegistryError> {
        let entry = Responder {
            handler: responder.clone(),
            pass_event_name,
        };

        if let Some(&i) = self.index.get(pattern) {
            self.routes[i].responders.push(entry);
        } else {
            let glob = compile(pattern)?;
            self.index.insert(pattern.to_string(), self.routes.len());
            self.routes.push(Route {
                source: pattern.to_string(),
                glob,
                responders: vec![entry],
            });
        }

        tracing::debug!(
            pattern,
            responder = responder.name(),
            pass_event_name,
            "responder registered"
        );
        Ok(responder)
    }

    /// Total number of registered responders.
    pub fn len(&self) -> usize {
        self.routes.iter().map(|r| r.responders.len()).sum()
    }

    /// True if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freezes the builder.
    pub fn build(self) -> Registry {
        Registry {
            routes: self.routes,
            index: self.index,
        }
    }
}

/// Compiles a shell-wildcard pattern.
fn compile(pattern: &str) -> Result<Pattern, RegistryError> {
    Pattern::new(&normalize(pattern)).map_err(|e| RegistryError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Rewrites `pattern` into the subset `glob::Pattern` accepts with the same meaning.
///
/// Under the default match options `*` already crosses `/`, so `**` adds nothing.
fn normalize(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = end;
                }
                None => out.push_str("[[]"),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `open`, if any.
///
/// A `]` right after `[` or `[!` belongs to the class.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

/// Immutable, shareable responder registry.
pub struct Registry {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Returns one [`WorkItem`] per `(matching pattern, responder index)`.
    ///
    /// Patterns are visited in registration order, responders in index order.
    pub fn fan_out(&self, event_name: &str, payload: &Payload) -> Vec<WorkItem> {
        let mut items = Vec::new();
        for route in self.routes.iter().filter(|r| r.glob.matches(event_name)) {
            tracing::debug!(
                pattern = %route.source,
                event = event_name,
                "matched responder pattern"
            );
            items.extend((0..route.responders.len()).map(|responder_index| WorkItem {
                pattern: route.source.clone(),
                responder_index,
                event_name: event_name.to_string(),
                payload: payload.clone(),
            }));
        }
        items
    }

    /// Resolves a work item's responder.
    pub fn resolve(&self, pattern: &str, responder_index: usize) -> Option<&Responder> {
        let route = &self.routes[*self.index.get(pattern)?];
        route.responders.get(responder_index)
    }

    /// Registered patterns in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.source.as_str())
    }

    /// Total number of registered responders.
    pub fn len(&self) -> usize {
        self.routes.iter().map(|r| r.responders.len()).sum()
    }

    /// True if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::error::ResponderError;
    use crate::responders::ResponderFn;

    fn noop(name: &'static str) -> ResponderRef {
        ResponderFn::arc(name, |_call: Call| async { Ok::<_, ResponderError>(()) })
    }

    #[test]
    fn test_register_returns_the_same_handle() {
        let mut b = RegistryBuilder::new();
        let r = noop("a");
        let back = b.respond_to("user.*", r.clone()).unwrap();
        assert!(Arc::ptr_eq(&r, &back));
    }

    #[test]
    fn test_fan_out_is_patterns_times_responders() {
        let mut b = RegistryBuilder::new();
        b.respond_to("user.*", noop("a")).unwrap();
        b.respond_to("user.*", noop("c")).unwrap();
        b.respond_to("user.created", noop("b")).unwrap();
        b.respond_to("order.*", noop("d")).unwrap();
        let reg = b.build();

        let items = reg.fan_out("user.created", &json!({"id": 1}));
        let keys: Vec<(&str, usize)> = items
            .iter()
            .map(|i| (i.pattern.as_str(), i.responder_index))
            .collect();
        assert_eq!(keys, vec![("user.*", 0), ("user.*", 1), ("user.created", 0)]);
        assert!(items.iter().all(|i| i.payload == json!({"id": 1})));

        assert_eq!(reg.fan_out("user.deleted", &json!(null)).len(), 2);
        assert!(reg.fan_out("invoice.paid", &json!(null)).is_empty());
    }

    #[test]
    fn test_matching_is_anchored_and_case_sensitive() {
        let mut b = RegistryBuilder::new();
        b.respond_to("user.created", noop("a")).unwrap();
        b.respond_to("user.*", noop("b")).unwrap();
        b.respond_to("?ob.run", noop("c")).unwrap();
        let reg = b.build();

        assert!(reg.fan_out("xuser.created", &json!(null)).is_empty());
        let longer = reg.fan_out("user.created.v2", &json!(null));
        assert_eq!(longer.len(), 1);
        assert_eq!(longer[0].pattern, "user.*");
        assert!(reg.fan_out("User.created", &json!(null)).is_empty());
        assert_eq!(reg.fan_out("user.a.b", &json!(null)).len(), 1);
        assert_eq!(reg.fan_out("job.run", &json!(null)).len(), 1);
        assert!(reg.fan_out("jobs.run", &json!(null)).is_empty());
    }

    #[test]
    fn test_resolve_by_pattern_and_index() {
        let mut b = RegistryBuilder::new();
        b.respond_to("x.*", noop("first")).unwrap();
        b.respond_to_named("x.*", noop("second")).unwrap();
        let reg = b.build();

        let second = reg.resolve("x.*", 1).unwrap();
        assert_eq!(second.handler().name(), "second");
        assert!(second.pass_event_name());
        assert!(reg.resolve("x.*", 2).is_none());
        assert!(reg.resolve("y.*", 0).is_none());
    }

    #[test]
    fn test_call_carries_event_name_only_when_asked() {
        let mut b = RegistryBuilder::new();
        b.respond_to("e", noop("plain")).unwrap();
        b.respond_to_named("e", noop("named")).unwrap();
        let reg = b.build();

        let items = reg.fan_out("e", &json!([1]));
        let plain = reg.resolve("e", 0).unwrap().call_for(&items[0]);
        let named = reg.resolve("e", 1).unwrap().call_for(&items[1]);

        assert_eq!(plain.event_name, None);
        assert_eq!(named.event_name.as_deref(), Some("e"));
        assert_eq!(named.payload, json!([1]));
    }

    #[test]
    fn test_repeated_stars_match_like_a_single_star() {
        let mut b = RegistryBuilder::new();
        b.respond_to("user.**", noop("a")).unwrap();
        b.respond_to("**.created", noop("b")).unwrap();
        b.respond_to("user***", noop("c")).unwrap();
        let reg = b.build();

        let hits = |name: &str| -> Vec<String> {
            reg.fan_out(name, &json!(null))
                .into_iter()
                .map(|i| i.pattern)
                .collect()
        };
        assert_eq!(hits("user.a.b"), vec!["user.**", "user***"]);
        assert_eq!(hits("user.created"), vec!["user.**", "**.created", "user***"]);
        assert_eq!(hits("order.created"), vec!["**.created"]);
        assert!(hits("order.placed").is_empty());
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        let mut b = RegistryBuilder::new();
        b.respond_to("user.[", noop("a")).unwrap();
        b.respond_to("v[12]", noop("b")).unwrap();
        b.respond_to("x[!]]", noop("c")).unwrap();
        let reg = b.build();

        assert_eq!(reg.fan_out("user.[", &json!(null)).len(), 1);
        assert!(reg.fan_out("user.a", &json!(null)).is_empty());
        assert_eq!(reg.fan_out("v2", &json!(null)).len(), 1);
        assert!(reg.fan_out("v3", &json!(null)).is_empty());
        assert_eq!(reg.fan_out("xa", &json!(null)).len(), 1);
        assert!(reg.fan_out("x]", &json!(null)).is_empty());
    }

    #[test]
    fn test_normalize_rewrites_only_what_glob_rejects() {
        assert_eq!(normalize("a.***.b"), "a.*.b");
        assert_eq!(normalize("a[bc]"), "a[bc]");
        assert_eq!(normalize("a[b"), "a[[]b");
        assert_eq!(normalize("[]x]"), "[]x]");
    }

    #[test]
    fn test_patterns_keep_registration_order() {
        let mut b = RegistryBuilder::new();
        b.respond_to("b.*", noop("1")).unwrap();
        b.respond_to("a.*", noop("2")).unwrap();
        b.respond_to("b.*", noop("3")).unwrap();
        let reg = b.build();

        assert_eq!(reg.patterns().collect::<Vec<_>>(), vec!["b.*", "a.*"]);
        assert_eq!(reg.len(), 3);
    }
}
