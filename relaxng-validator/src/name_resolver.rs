//! The prefix-to-namespace scope stack.
//!
//! Scope stack is append-only within a frame; `leave_context` pops the top
//! frame. Lookups walk from the top of the stack down, so an inner
//! `definePrefix` shadows an outer one, matching XML namespace scoping.

use std::collections::HashMap;

/// The well-known `xml` prefix, implicitly bound in every scope per the XML
/// namespaces recommendation; producers need not call `define_prefix` for
/// it, but may.
const XML_NAMESPACE_URI: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    scopes: Vec<HashMap<String, String>>,
}

impl NameResolver {
    pub fn new() -> NameResolver {
        NameResolver { scopes: Vec::new() }
    }

    pub fn enter_context(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn leave_context(&mut self) {
        self.scopes.pop();
    }

    pub fn define_prefix(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(prefix.into(), uri.into());
        }
    }

    fn lookup_prefix(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE_URI);
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix))
            .map(String::as_str)
    }

    /// Splits `qname` on `:` and resolves the prefix, returning the
    /// expanded `(namespace_uri, local_name)`. For attributes, an
    /// unprefixed name resolves to the empty namespace regardless of any
    /// default namespace declaration (the Relax NG/XML Namespaces
    /// attribute rule); for elements, an unprefixed name picks up the
    /// in-scope default namespace (bound to the empty prefix).
    pub fn resolve_name(&self, qname: &str, is_attribute: bool) -> Option<(String, String)> {
        match qname.split_once(':') {
            Some((prefix, local)) => self
                .lookup_prefix(prefix)
                .map(|ns| (ns.to_string(), local.to_string())),
            None => {
                if is_attribute {
                    Some((String::new(), qname.to_string()))
                } else {
                    let ns = self.lookup_prefix("").unwrap_or("").to_string();
                    Some((ns, qname.to_string()))
                }
            }
        }
    }

    /// Finds a prefix bound to `namespace_uri` in the current scope stack
    /// and formats `local_name` qualified by it (or unqualified if the
    /// namespace is the empty string and no prefix is bound to it).
    /// Ambiguous when several prefixes are bound to the same uri -- the
    /// most recently defined one wins, matching `resolve_name`'s own
    /// shadowing order.
    pub fn unresolve_name(&self, namespace_uri: &str, local_name: &str) -> String {
        if namespace_uri.is_empty() {
            return local_name.to_string();
        }
        for scope in self.scopes.iter().rev() {
            for (prefix, uri) in scope {
                if uri == namespace_uri {
                    return if prefix.is_empty() {
                        local_name.to_string()
                    } else {
                        format!("{prefix}:{local_name}")
                    };
                }
            }
        }
        local_name.to_string()
    }
}
