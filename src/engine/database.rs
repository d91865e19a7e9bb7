//! Named analysis profiles and the universal action tree.
//!
//! The database owns one *universal* action tree containing every action and rule the
//! engine knows about, each tagged with a group. A profile (`decompile`, `jumptable`,
//! `normalize`, ...) is a named [`ActionGroupList`]; its root action is derived by cloning
//! the universal tree against that list, which drops every member whose group is not in the
//! profile. Derived roots are cached by profile name.

use std::collections::BTreeMap;

use crate::{
    actions::{
        ActionDeadCode, ActionDeindirect, ActionMultiCse, ActionNonzeroMask, ActionStart,
        ActionStartCleanUp, ActionStop,
    },
    engine::{
        action::{Action, ActionFlags},
        group::ActionGroup,
        pool::ActionPool,
        restart::{ActionRestartGroup, DEFAULT_MAX_RESTARTS},
        ActionGroupList,
    },
    rules, Error, Result,
};

/// Name under which the universal tree is registered.
pub const UNIVERSAL: &str = "universal";

/// Profile made current by [`ActionDatabase::reset_defaults`].
pub const DEFAULT_PROFILE: &str = "decompile";

/// Registry of profiles and their root actions.
#[derive(Debug)]
pub struct ActionDatabase {
    current: Option<String>,
    group_map: BTreeMap<String, ActionGroupList>,
    action_map: BTreeMap<String, Box<dyn Action>>,
    max_restarts: usize,
}

impl Default for ActionDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionDatabase {
    /// Creates a database holding the default profiles but no actions yet.
    #[must_use]
    pub fn new() -> Self {
        let mut db = Self {
            current: None,
            group_map: BTreeMap::new(),
            action_map: BTreeMap::new(),
            max_restarts: DEFAULT_MAX_RESTARTS,
        };
        db.build_default_groups();
        db
    }

    fn build_default_groups(&mut self) {
        const PROFILES: &[(&str, &[&str])] = &[
            ("decompile", &["base", "deindirect", "deadcode", "analysis", "segment", "cleanup"]),
            ("jumptable", &["base", "deadcode", "analysis", "segment"]),
            ("normalize", &["base", "deindirect", "deadcode", "analysis"]),
            ("paramid", &["base", "deindirect", "deadcode", "analysis"]),
            ("register", &["base", "analysis"]),
            ("firstpass", &["base"]),
        ];
        self.group_map.clear();
        for (name, members) in PROFILES {
            self.set_group(name, members);
        }
    }

    /// Drops every derived root, rebuilds the universal tree and makes the default profile
    /// current.
    ///
    /// # Errors
    ///
    /// Fails only if the default profile is missing.
    pub fn reset_defaults(&mut self) -> Result<()> {
        self.action_map.clear();
        self.build_default_groups();
        self.universal_action();
        self.set_current(DEFAULT_PROFILE)?;
        Ok(())
    }

    /// Builds the universal action tree and registers it.
    ///
    /// ```text
    /// universal (restart)
    /// ├── start
    /// ├── fullloop
    /// │   ├── mainloop
    /// │   │   ├── deadcode
    /// │   │   ├── nonzeromask
    /// │   │   └── stackstall
    /// │   │       ├── oppool1
    /// │   │       ├── multicse
    /// │   │       └── deindirect
    /// │   └── deadcode
    /// ├── startcleanup
    /// ├── cleanup
    /// └── stop
    /// ```
    pub fn universal_action(&mut self) {
        let stackstall = ActionGroup::new(ActionFlags::REPEAT_APPLY, "stackstall")
            .with(ActionPool::with_rules(
                ActionFlags::REPEAT_APPLY,
                "oppool1",
                rules::analysis_rules(),
            ))
            .with(ActionMultiCse::new("analysis"))
            .with(ActionDeindirect::new("deindirect"));

        let mainloop = ActionGroup::new(ActionFlags::REPEAT_APPLY, "mainloop")
            .with(ActionDeadCode::new("deadcode"))
            .with(ActionNonzeroMask::new("analysis"))
            .with(stackstall);

        let fullloop = ActionGroup::new(ActionFlags::REPEAT_APPLY, "fullloop")
            .with(mainloop)
            .with(ActionDeadCode::new("deadcode"));

        let universal =
            ActionRestartGroup::new(ActionFlags::ONCE_PER_FUNC, UNIVERSAL, self.max_restarts)
                .with(ActionStart::new("base"))
                .with(fullloop)
                .with(ActionStartCleanUp::new("cleanup"))
                .with(ActionPool::with_rules(
                    ActionFlags::REPEAT_APPLY,
                    "cleanup",
                    rules::cleanup_rules(),
                ))
                .with(ActionStop::new("base"));

        self.register_action(UNIVERSAL, Box::new(universal));
    }

    fn register_action(&mut self, name: &str, action: Box<dyn Action>) {
        self.action_map.insert(name.to_string(), action);
    }

    /// The root action registered under `name`.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&dyn Action> {
        self.action_map.get(name).map(|a| a.as_ref())
    }

    /// Derives the root for profile `group` from the action registered as `base_action`,
    /// unless it was derived before.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAction`] if either name is unknown, or if the profile
    /// filters out every action.
    pub fn derive_action(&mut self, base_action: &str, group: &str) -> Result<()> {
        if self.action_map.contains_key(group) {
            return Ok(());
        }
        let groups = self
            .group_map
            .get(group)
            .ok_or_else(|| Error::UnknownAction(format!("profile {}", group)))?;
        let base = self
            .action_map
            .get(base_action)
            .ok_or_else(|| Error::UnknownAction(format!("root action {}", base_action)))?;
        let derived = base
            .clone_action(groups)
            .ok_or_else(|| Error::UnknownAction(format!("profile {} has no actions", group)))?;
        tracing::debug!(profile = group, from = base_action, "derived root action");
        self.register_action(group, derived);
        Ok(())
    }

    /// Makes profile `name` current, deriving its root from the universal tree on first use.
    ///
    /// # Errors
    ///
    /// Fails if the profile is unknown or the universal tree has not been built.
    pub fn set_current(&mut self, name: &str) -> Result<&mut (dyn Action + 'static)> {
        self.derive_action(UNIVERSAL, name)?;
        self.current = Some(name.to_string());
        self.action_map
            .get_mut(name)
            .map(|a| a.as_mut())
            .ok_or_else(|| Error::UnknownAction(name.to_string()))
    }

    /// Name of the current profile.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The current root action.
    #[must_use]
    pub fn current(&self) -> Option<&dyn Action> {
        self.current.as_deref().and_then(|name| self.action(name))
    }

    /// The current root action, mutably.
    pub fn current_mut(&mut self) -> Option<&mut (dyn Action + 'static)> {
        let name = self.current.as_deref()?;
        self.action_map.get_mut(name).map(|a| a.as_mut())
    }

    /// Group list of the current profile.
    #[must_use]
    pub fn current_groups(&self) -> Option<&ActionGroupList> {
        self.current.as_deref().and_then(|name| self.group(name))
    }

    /// The group list of profile `name`.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&ActionGroupList> {
        self.group_map.get(name)
    }

    /// Names of all profiles.
    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.group_map.keys().map(String::as_str)
    }

    /// Defines (or redefines) profile `name` with exactly `members`.
    pub fn set_group(&mut self, name: &str, members: &[&str]) {
        self.group_map.insert(
            name.to_string(),
            ActionGroupList::from_groups(members.iter().copied()),
        );
    }

    /// Copies profile `old` as `new`.
    ///
    /// # Errors
    ///
    /// Fails if `old` does not exist.
    pub fn clone_group(&mut self, old: &str, new: &str) -> Result<()> {
        let list = self
            .group_map
            .get(old)
            .cloned()
            .ok_or_else(|| Error::UnknownAction(format!("profile {}", old)))?;
        self.group_map.insert(new.to_string(), list);
        Ok(())
    }

    /// Adds group tag `tag` to profile `name`. Returns `false` if it was already present.
    ///
    /// # Errors
    ///
    /// Fails if the profile does not exist.
    pub fn add_to_group(&mut self, name: &str, tag: &str) -> Result<bool> {
        self.group_map
            .get_mut(name)
            .map(|list| list.insert(tag))
            .ok_or_else(|| Error::UnknownAction(format!("profile {}", name)))
    }

    /// Removes group tag `tag` from profile `name`. Returns `false` if it was not present.
    ///
    /// # Errors
    ///
    /// Fails if the profile does not exist.
    pub fn remove_from_group(&mut self, name: &str, tag: &str) -> Result<bool> {
        self.group_map
            .get_mut(name)
            .map(|list| list.remove(tag))
            .ok_or_else(|| Error::UnknownAction(format!("profile {}", name)))
    }

    /// The restart bound used for newly built trees.
    #[must_use]
    pub fn max_restarts(&self) -> usize {
        self.max_restarts
    }

    /// Changes the restart bound of the universal tree, every derived root, and trees
    /// built later.
    pub fn set_max_restarts(&mut self, max: usize) {
        self.max_restarts = max;
        for action in self.action_map.values_mut() {
            action.set_max_restarts(max);
        }
    }
}
