//! Typed, scoped option store.
//!
//! Options are declared once in [`OPTION_TABLE`] with their scope, kind,
//! and default. Each session, window, and pane carries a sparse
//! [`Options`] layer; lookup walks from the most specific layer to the
//! matching global layer and finally the table default. Numeric writes
//! clamp to the registered range; invalid choice values fail the write.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option: {0}")]
    Unknown(String),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}

/// Which level of the hierarchy an option is registered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionScope {
    Server,
    Session,
    Window,
    Pane,
}

/// The value kind an option accepts.
#[derive(Debug, Clone, Copy)]
pub enum OptionKind {
    String,
    Number { min: i64, max: i64 },
    Flag,
    Color,
    Key,
    Choice(&'static [&'static str]),
    Style,
    List,
}

/// A concrete option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    Number(i64),
    Flag(bool),
    /// Index into the registered choice list.
    Choice(usize),
    List(Vec<String>),
}

/// Static registration of one option.
pub struct OptionDef {
    pub name: &'static str,
    pub scope: OptionScope,
    pub kind: OptionKind,
    pub default: DefaultValue,
}

/// Allocation-free default for the table.
pub enum DefaultValue {
    Str(&'static str),
    Num(i64),
    Flag(bool),
    Choice(usize),
    EmptyList,
}

impl DefaultValue {
    fn to_value(&self) -> OptionValue {
        match self {
            Self::Str(s) => OptionValue::String((*s).to_string()),
            Self::Num(n) => OptionValue::Number(*n),
            Self::Flag(b) => OptionValue::Flag(*b),
            Self::Choice(i) => OptionValue::Choice(*i),
            Self::EmptyList => OptionValue::List(Vec::new()),
        }
    }
}

pub const BELL_ACTIONS: &[&str] = &["none", "any", "current", "other"];

/// Every option the core reads. The command layer may set them; nothing
/// else is accepted.
pub static OPTION_TABLE: &[OptionDef] = &[
    OptionDef {
        name: "history-limit",
        scope: OptionScope::Session,
        kind: OptionKind::Number { min: 0, max: 10_000_000 },
        default: DefaultValue::Num(2000),
    },
    OptionDef {
        name: "base-index",
        scope: OptionScope::Session,
        kind: OptionKind::Number { min: 0, max: 1 },
        default: DefaultValue::Num(0),
    },
    OptionDef {
        name: "renumber-windows",
        scope: OptionScope::Session,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "destroy-unattached",
        scope: OptionScope::Session,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "status-interval",
        scope: OptionScope::Session,
        kind: OptionKind::Number { min: 0, max: 3600 },
        default: DefaultValue::Num(15),
    },
    OptionDef {
        name: "default-shell",
        scope: OptionScope::Session,
        kind: OptionKind::String,
        default: DefaultValue::Str(""),
    },
    OptionDef {
        name: "escape-time",
        scope: OptionScope::Server,
        kind: OptionKind::Number { min: 0, max: 10_000 },
        default: DefaultValue::Num(500),
    },
    OptionDef {
        name: "set-titles",
        scope: OptionScope::Session,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "bell-action",
        scope: OptionScope::Session,
        kind: OptionKind::Choice(BELL_ACTIONS),
        default: DefaultValue::Choice(1),
    },
    OptionDef {
        name: "visual-bell",
        scope: OptionScope::Session,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "activity-action",
        scope: OptionScope::Session,
        kind: OptionKind::Choice(BELL_ACTIONS),
        default: DefaultValue::Choice(3),
    },
    OptionDef {
        name: "visual-activity",
        scope: OptionScope::Session,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "silence-action",
        scope: OptionScope::Session,
        kind: OptionKind::Choice(BELL_ACTIONS),
        default: DefaultValue::Choice(3),
    },
    OptionDef {
        name: "visual-silence",
        scope: OptionScope::Session,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "monitor-bell",
        scope: OptionScope::Window,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(true),
    },
    OptionDef {
        name: "monitor-activity",
        scope: OptionScope::Window,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "monitor-silence",
        scope: OptionScope::Window,
        kind: OptionKind::Number { min: 0, max: 86_400 },
        default: DefaultValue::Num(0),
    },
    OptionDef {
        name: "aggressive-resize",
        scope: OptionScope::Window,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
    OptionDef {
        name: "mode-keys",
        scope: OptionScope::Window,
        kind: OptionKind::Choice(&["emacs", "vi"]),
        default: DefaultValue::Choice(0),
    },
    OptionDef {
        name: "remain-on-exit",
        scope: OptionScope::Pane,
        kind: OptionKind::Flag,
        default: DefaultValue::Flag(false),
    },
];

pub fn lookup_def(name: &str) -> Option<&'static OptionDef> {
    OPTION_TABLE.iter().find(|def| def.name == name)
}

/// One sparse layer of option values.
#[derive(Debug, Default)]
pub struct Options {
    values: HashMap<&'static str, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored in this layer, if any.
    pub fn get_local(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Parse and store a value, validating against the table. Numbers
    /// clamp to the registered range; bad flags and choices fail.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        let def = lookup_def(name).ok_or_else(|| OptionError::Unknown(name.to_string()))?;
        let parsed = parse_value(def, value)?;
        self.values.insert(def.name, parsed);
        Ok(())
    }

    /// Store an already-typed value.
    pub fn set_value(&mut self, name: &str, value: OptionValue) -> Result<(), OptionError> {
        let def = lookup_def(name).ok_or_else(|| OptionError::Unknown(name.to_string()))?;
        self.values.insert(def.name, value);
        Ok(())
    }

    /// Remove a local value, falling back to the layers below.
    pub fn unset(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionValue)> {
        self.values.iter().map(|(&k, v)| (k, v))
    }
}

fn parse_value(def: &OptionDef, value: &str) -> Result<OptionValue, OptionError> {
    let invalid = || OptionError::Invalid {
        name: def.name.to_string(),
        value: value.to_string(),
    };
    match def.kind {
        OptionKind::String | OptionKind::Color | OptionKind::Key | OptionKind::Style => {
            Ok(OptionValue::String(value.to_string()))
        }
        OptionKind::Number { min, max } => {
            let n: i64 = value.parse().map_err(|_| invalid())?;
            Ok(OptionValue::Number(n.clamp(min, max)))
        }
        OptionKind::Flag => match value {
            "on" | "1" | "yes" | "true" => Ok(OptionValue::Flag(true)),
            "off" | "0" | "no" | "false" => Ok(OptionValue::Flag(false)),
            _ => Err(invalid()),
        },
        OptionKind::Choice(choices) => choices
            .iter()
            .position(|&c| c == value)
            .map(OptionValue::Choice)
            .ok_or_else(invalid),
        OptionKind::List => Ok(OptionValue::List(
            value.split(',').map(str::to_string).collect(),
        )),
    }
}

/// Lookup walking a most-specific-first chain of layers, ending at the
/// table default.
pub struct OptionChain<'a> {
    layers: Vec<&'a Options>,
}

impl<'a> OptionChain<'a> {
    pub fn new(layers: Vec<&'a Options>) -> Self {
        Self { layers }
    }

    pub fn get(&self, name: &str) -> Option<OptionValue> {
        for layer in &self.layers {
            if let Some(v) = layer.get_local(name) {
                return Some(v.clone());
            }
        }
        lookup_def(name).map(|def| def.default.to_value())
    }

    pub fn number(&self, name: &str) -> i64 {
        match self.get(name) {
            Some(OptionValue::Number(n)) => n,
            _ => 0,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(OptionValue::Flag(true)))
    }

    pub fn string(&self, name: &str) -> String {
        match self.get(name) {
            Some(OptionValue::String(s)) => s,
            _ => String::new(),
        }
    }

    /// Resolve a choice option to its registered name.
    pub fn choice(&self, name: &str) -> &'static str {
        let idx = match self.get(name) {
            Some(OptionValue::Choice(i)) => i,
            _ => return "",
        };
        match lookup_def(name).map(|d| d.kind) {
            Some(OptionKind::Choice(choices)) => choices.get(idx).copied().unwrap_or(""),
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_comes_from_table() {
        let chain = OptionChain::new(vec![]);
        assert_eq!(chain.number("history-limit"), 2000);
        assert_eq!(chain.choice("bell-action"), "any");
        assert!(!chain.flag("remain-on-exit"));
    }

    #[test]
    fn more_specific_layer_wins() {
        let mut session = Options::new();
        session.set("history-limit", "500").unwrap();
        let mut global = Options::new();
        global.set("history-limit", "9000").unwrap();

        let chain = OptionChain::new(vec![&session, &global]);
        assert_eq!(chain.number("history-limit"), 500);

        let chain = OptionChain::new(vec![&global]);
        assert_eq!(chain.number("history-limit"), 9000);
    }

    #[test]
    fn unset_falls_through() {
        let mut session = Options::new();
        session.set("visual-bell", "on").unwrap();
        session.unset("visual-bell");
        let chain = OptionChain::new(vec![&session]);
        assert!(!chain.flag("visual-bell"));
    }

    #[test]
    fn numbers_clamp_to_range() {
        let mut opts = Options::new();
        opts.set("status-interval", "999999").unwrap();
        let chain = OptionChain::new(vec![&opts]);
        assert_eq!(chain.number("status-interval"), 3600);

        opts.set("monitor-silence", "-5").unwrap();
        let chain = OptionChain::new(vec![&opts]);
        assert_eq!(chain.number("monitor-silence"), 0);
    }

    #[test]
    fn invalid_choice_fails() {
        let mut opts = Options::new();
        let err = opts.set("bell-action", "sometimes").unwrap_err();
        assert!(matches!(err, OptionError::Invalid { .. }));
    }

    #[test]
    fn unknown_option_fails() {
        let mut opts = Options::new();
        assert_eq!(
            opts.set("no-such-option", "1"),
            Err(OptionError::Unknown("no-such-option".into()))
        );
    }

    #[test]
    fn flag_spellings() {
        let mut opts = Options::new();
        for (s, expected) in [("on", true), ("off", false), ("1", true), ("no", false)] {
            opts.set("visual-bell", s).unwrap();
            let chain = OptionChain::new(vec![&opts]);
            assert_eq!(chain.flag("visual-bell"), expected, "spelling {s}");
        }
        assert!(opts.set("visual-bell", "maybe").is_err());
    }
}
