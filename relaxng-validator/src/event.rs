//! Event types the engine is driven by.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EnterContext,
    LeaveContext,
    DefinePrefix {
        prefix: String,
        uri: String,
    },
    EnterStartTag {
        ns: String,
        local: String,
    },
    LeaveStartTag,
    StartTagAndAttributes {
        ns: String,
        local: String,
        attributes: Vec<(String, String, String)>,
    },
    EndTag {
        ns: String,
        local: String,
    },
    AttributeName {
        ns: String,
        local: String,
    },
    AttributeValue {
        value: String,
    },
    AttributeNameAndValue {
        ns: String,
        local: String,
        value: String,
    },
    Text {
        value: String,
    },
}

impl Event {
    pub fn enter_start_tag(ns: impl Into<String>, local: impl Into<String>) -> Event {
        Event::EnterStartTag {
            ns: ns.into(),
            local: local.into(),
        }
    }

    pub fn end_tag(ns: impl Into<String>, local: impl Into<String>) -> Event {
        Event::EndTag {
            ns: ns.into(),
            local: local.into(),
        }
    }

    pub fn attribute_name(ns: impl Into<String>, local: impl Into<String>) -> Event {
        Event::AttributeName {
            ns: ns.into(),
            local: local.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Event {
        Event::Text { value: value.into() }
    }

    /// True for `text` events whose content is only XML whitespace -- the
    /// ones the grammar walker may suspend rather than dispatch
    /// immediately.
    pub fn is_whitespace_text(&self) -> bool {
        matches!(self, Event::Text { value } if value.chars().all(char::is_whitespace))
    }

    /// True for events that only occur inside an element's attribute
    /// phase -- used by `GrammarWalker::possible` to decide whether to
    /// filter the union down to attribute events only.
    pub fn is_attribute_phase_event(&self) -> bool {
        matches!(
            self,
            Event::AttributeName { .. } | Event::AttributeValue { .. } | Event::AttributeNameAndValue { .. }
        )
    }
}
