//! The textual configuration protocol.
//!
//! Every option is a name plus up to three string parameters, the shape embedding
//! applications forward from their own command languages:
//!
//! | option        | parameters                   | effect                                     |
//! |---------------|------------------------------|--------------------------------------------|
//! | `setaction`   | `<profile> [<new>]`          | make a profile current, or clone it first  |
//! | `togglerule`  | `<path> on\|off`             | enable/disable a rule or action            |
//! | `warning`     | `<name> on\|off`             | applied-once warnings for an action/rule   |
//! | `break`       | `start\|action\|tmp <name>`  | set a breakpoint on an action              |
//! | `maxrestarts` | `<n>`                        | bound the restart controller               |
//!
//! Rule and action toggles apply to the current root action.

use crate::{
    engine::{
        action::{find_action, Action, ActionFlags},
        database::ActionDatabase,
    },
    Error, Result,
};

/// Applies option commands to an [`ActionDatabase`].
#[derive(Debug)]
pub struct OptionDatabase<'a> {
    actions: &'a mut ActionDatabase,
}

fn parse_on_off(value: &str) -> Result<bool> {
    match value {
        "on" | "true" | "" => Ok(true),
        "off" | "false" => Ok(false),
        other => Err(Error::Parse(format!("expected on or off, got '{}'", other))),
    }
}

fn require<'p>(value: &'p str, what: &str, option: &str) -> Result<&'p str> {
    if value.is_empty() {
        Err(Error::Parse(format!("{} requires {}", option, what)))
    } else {
        Ok(value)
    }
}

impl<'a> OptionDatabase<'a> {
    /// Creates the option interface over `actions`.
    pub fn new(actions: &'a mut ActionDatabase) -> Self {
        Self { actions }
    }

    /// Applies option `name` with up to three parameters (unused ones empty) and returns
    /// a confirmation message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for unknown options or missing and malformed parameters,
    /// and [`Error::UnknownAction`] when a profile, action or rule does not resolve.
    pub fn set(&mut self, name: &str, p1: &str, p2: &str, p3: &str) -> Result<String> {
        let result = match name {
            "setaction" => self.set_action(p1, p2),
            "togglerule" => self.toggle_rule(p1, p2),
            "warning" => self.warning(p1, p2),
            "break" => self.set_break(p1, p2),
            "maxrestarts" => self.max_restarts(p1),
            other => Err(Error::Parse(format!("unknown option '{}'", other))),
        };
        if p3.is_empty() {
            result
        } else {
            result.map(|msg| format!("{} (ignored extra parameter '{}')", msg, p3))
        }
    }

    /// Parses `line` as `<option> [p1 [p2 [p3]]]` and applies it.
    ///
    /// # Errors
    ///
    /// See [`OptionDatabase::set`]; an empty line or too many parameters is a parse error.
    pub fn parse_command(&mut self, line: &str) -> Result<String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => Err(Error::Parse("empty option command".to_string())),
            [name] => self.set(name, "", "", ""),
            [name, p1] => self.set(name, p1, "", ""),
            [name, p1, p2] => self.set(name, p1, p2, ""),
            [name, p1, p2, p3] => self.set(name, p1, p2, p3),
            _ => Err(Error::Parse(format!("too many parameters in '{}'", line))),
        }
    }

    fn current_root(&mut self) -> Result<&mut (dyn Action + 'static)> {
        self.actions
            .current_mut()
            .ok_or_else(|| Error::UnknownAction("no current root action".to_string()))
    }

    fn set_action(&mut self, profile: &str, new_name: &str) -> Result<String> {
        let profile = require(profile, "a profile name", "setaction")?;
        if new_name.is_empty() {
            self.actions.set_current(profile)?;
            Ok(format!("Set current action to {}", profile))
        } else {
            self.actions.clone_group(profile, new_name)?;
            self.actions.set_current(new_name)?;
            Ok(format!("Created {} from {} and made it current", new_name, profile))
        }
    }

    fn toggle_rule(&mut self, path: &str, value: &str) -> Result<String> {
        let path = require(path, "a rule or action path", "togglerule")?;
        let on = parse_on_off(require(value, "on or off", "togglerule")?)?;
        let state = if on { "enabled" } else { "disabled" };
        let root = self.current_root()?;

        let (scope, leaf) = match path.rsplit_once(':') {
            Some((scope, leaf)) => (Some(scope), leaf),
            None => (None, path),
        };
        let found = match scope {
            Some(scope) => find_action(&mut *root, scope)
                .is_some_and(|action| action.set_rule_enabled(leaf, on)),
            None => root.set_rule_enabled(leaf, on),
        };
        if found {
            return Ok(format!("Rule {} {}", path, state));
        }

        let action = find_action(root, path)
            .ok_or_else(|| Error::UnknownAction(path.to_string()))?;
        action.base_mut().flags.set(ActionFlags::DISABLED, !on);
        Ok(format!("Action {} {}", path, state))
    }

    fn warning(&mut self, name: &str, value: &str) -> Result<String> {
        let name = require(name, "an action or rule name", "warning")?;
        let on = parse_on_off(value)?;
        let state = if on { "on" } else { "off" };
        let root = self.current_root()?;
        if let Some(action) = find_action(&mut *root, name) {
            action.base_mut().flags.set(ActionFlags::WARNINGS_ON, on);
            return Ok(format!("Warnings for action {} {}", name, state));
        }
        if root.set_rule_warnings(name, on) {
            return Ok(format!("Warnings for rule {} {}", name, state));
        }
        Err(Error::UnknownAction(name.to_string()))
    }

    fn set_break(&mut self, kind: &str, name: &str) -> Result<String> {
        let kind = require(kind, "start, action or tmp", "break")?;
        let name = require(name, "an action name", "break")?;
        let flag = match kind {
            "start" => ActionFlags::BREAK_START,
            "action" => ActionFlags::BREAK_ACTION,
            "tmp" => ActionFlags::TMP_BREAK,
            other => {
                return Err(Error::Parse(format!(
                    "unknown breakpoint kind '{}', expected start, action or tmp",
                    other
                )))
            }
        };
        let action = find_action(self.current_root()?, name)
            .ok_or_else(|| Error::UnknownAction(name.to_string()))?;
        action.base_mut().flags |= flag;
        Ok(format!("Break {} set on {}", kind, name))
    }

    fn max_restarts(&mut self, value: &str) -> Result<String> {
        let value = require(value, "a number", "maxrestarts")?;
        let max: usize = value
            .parse()
            .map_err(|_| Error::Parse(format!("maxrestarts expects a number, got '{}'", value)))?;
        self.actions.set_max_restarts(max);
        Ok(format!("Maximum restarts set to {}", max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> Result<ActionDatabase> {
        let mut db = ActionDatabase::new();
        db.reset_defaults()?;
        Ok(db)
    }

    #[test]
    fn test_missing_parameters_are_parse_errors() -> Result<()> {
        let mut db = database()?;
        let mut options = OptionDatabase::new(&mut db);
        assert!(matches!(options.set("maxrestarts", "", "", ""), Err(Error::Parse(_))));
        assert!(matches!(options.set("togglerule", "", "", ""), Err(Error::Parse(_))));
        assert!(matches!(options.set("break", "start", "", ""), Err(Error::Parse(_))));
        assert!(matches!(options.set("nosuch", "x", "", ""), Err(Error::Parse(_))));
        assert!(matches!(options.parse_command("   "), Err(Error::Parse(_))));
        assert!(matches!(
            options.set("maxrestarts", "many", "", ""),
            Err(Error::Parse(_))
        ));
        Ok(())
    }

    #[test]
    fn test_toggle_rule_by_path_and_name() -> Result<()> {
        let mut db = database()?;
        let mut options = OptionDatabase::new(&mut db);
        assert_eq!(
            options.parse_command("togglerule oppool1:trivialarith off")?,
            "Rule oppool1:trivialarith disabled"
        );
        assert_eq!(
            options.parse_command("togglerule multnegone on")?,
            "Rule multnegone enabled"
        );
        assert!(matches!(
            options.parse_command("togglerule cleanup:trivialarith off"),
            Err(Error::UnknownAction(_))
        ));
        assert!(matches!(
            options.parse_command("togglerule nosuchrule off"),
            Err(Error::UnknownAction(_))
        ));
        Ok(())
    }

    #[test]
    fn test_toggle_action() -> Result<()> {
        let mut db = database()?;
        OptionDatabase::new(&mut db).parse_command("togglerule deindirect off")?;
        let root = db
            .current_mut()
            .ok_or_else(|| Error::Error("no root".into()))?;
        let action = find_action(root, "deindirect")
            .ok_or_else(|| Error::Error("no deindirect".into()))?;
        assert!(action.base().flags.contains(ActionFlags::DISABLED));
        Ok(())
    }

    #[test]
    fn test_breakpoints_and_warnings() -> Result<()> {
        let mut db = database()?;
        {
            let mut options = OptionDatabase::new(&mut db);
            options.parse_command("break tmp deadcode")?;
            options.parse_command("warning multicse on")?;
            options.parse_command("warning trivialarith on")?;
            assert!(matches!(
                options.parse_command("break sometimes deadcode"),
                Err(Error::Parse(_))
            ));
        }
        let root = db
            .current_mut()
            .ok_or_else(|| Error::Error("no root".into()))?;
        let deadcode = find_action(&mut *root, "deadcode")
            .ok_or_else(|| Error::Error("no deadcode".into()))?;
        assert!(deadcode.base().flags.contains(ActionFlags::TMP_BREAK));
        let multicse = find_action(root, "multicse")
            .ok_or_else(|| Error::Error("no multicse".into()))?;
        assert!(multicse.base().flags.contains(ActionFlags::WARNINGS_ON));
        Ok(())
    }

    #[test]
    fn test_setaction_clone() -> Result<()> {
        let mut db = database()?;
        let msg = OptionDatabase::new(&mut db).set("setaction", "decompile", "mine", "")?;
        assert!(msg.contains("mine"));
        assert_eq!(db.current_name(), Some("mine"));
        assert!(db.group("mine").is_some());
        Ok(())
    }

    #[test]
    fn test_maxrestarts() -> Result<()> {
        let mut db = database()?;
        OptionDatabase::new(&mut db).parse_command("maxrestarts 3")?;
        assert_eq!(db.max_restarts(), 3);
        Ok(())
    }
}
