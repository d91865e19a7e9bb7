#![allow(unused_macros)]

/// Declares a copyable arena handle wrapping a `usize` index.
///
/// ```rust, ignore
///  arena_handle!(
///      /// Handle to a varnode.
///      VarnodeId, "vn"
///  );
///  assert_eq!(VarnodeId::new(3).to_string(), "vn3");
/// ```
macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            /// Creates a handle from an arena index.
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Returns the underlying arena index.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

/// Declares a stateless rule type carrying only its group tag.
///
/// The generated type has a `NAME` constant and a `new(group)` constructor. The `Rule`
/// implementation is written by hand next to it, using [`rule_identity!`] for the
/// name and group accessors.
///
/// ```rust, ignore
///  define_rule!(
///      /// `x ^ x => 0`
///      RuleTrivialArith, "trivialarith"
///  );
/// ```
macro_rules! define_rule {
    ($(#[$meta:meta])* $name:ident, $rule_name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            group: String,
        }

        impl $name {
            /// The name this rule is registered and toggled under.
            pub const NAME: &'static str = $rule_name;

            /// Creates the rule, tagged with `group`.
            #[must_use]
            pub fn new(group: impl Into<String>) -> Self {
                Self { group: group.into() }
            }
        }
    };
}

/// Expands to the `name` and `group` methods of a `Rule` impl for a [`define_rule!`] type.
macro_rules! rule_identity {
    () => {
        fn name(&self) -> &str {
            Self::NAME
        }

        fn group(&self) -> &str {
            &self.group
        }
    };
}
