// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scoped global binding options.
//!
//! Settings are process-wide and read lock-free (`ArcSwap`). An [`Options`]
//! value snapshots them on construction and puts the snapshot back when it
//! drops, so changes only last for the enclosing scope:
//!
//! ```ignore
//! {
//!     let mut opts = Options::new();
//!     opts.disable_function_signatures();
//!     // bindings created here carry no signatures
//! }
//! assert!(Options::show_function_signatures());
//! ```

use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OptionState {
    show_user_defined_docstrings: bool,
    show_function_signatures: bool,
}

impl Default for OptionState {
    fn default() -> Self {
        Self {
            show_user_defined_docstrings: true,
            show_function_signatures: true,
        }
    }
}

fn global() -> &'static ArcSwap<OptionState> {
    static STATE: OnceLock<ArcSwap<OptionState>> = OnceLock::new();
    STATE.get_or_init(|| ArcSwap::from_pointee(OptionState::default()))
}

/// RAII handle on the global options.
#[derive(Debug)]
pub struct Options {
    previous: Arc<OptionState>,
}

impl Options {
    pub fn new() -> Self {
        Self {
            previous: global().load_full(),
        }
    }

    fn update(&mut self, f: impl Fn(&mut OptionState)) -> &mut Self {
        global().rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
        self
    }

    pub fn disable_user_defined_docstrings(&mut self) -> &mut Self {
        self.update(|s| s.show_user_defined_docstrings = false)
    }

    pub fn enable_user_defined_docstrings(&mut self) -> &mut Self {
        self.update(|s| s.show_user_defined_docstrings = true)
    }

    pub fn disable_function_signatures(&mut self) -> &mut Self {
        self.update(|s| s.show_function_signatures = false)
    }

    pub fn enable_function_signatures(&mut self) -> &mut Self {
        self.update(|s| s.show_function_signatures = true)
    }

    pub fn disable_all_docstrings(&mut self) -> &mut Self {
        self.disable_user_defined_docstrings()
            .disable_function_signatures()
    }

    pub fn enable_all_docstrings(&mut self) -> &mut Self {
        self.enable_user_defined_docstrings()
            .enable_function_signatures()
    }

    pub fn show_user_defined_docstrings() -> bool {
        global().load().show_user_defined_docstrings
    }

    pub fn show_function_signatures() -> bool {
        global().load().show_function_signatures
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Options {
    fn drop(&mut self) {
        global().store(Arc::clone(&self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_restore_previous_state() {
        assert!(Options::show_user_defined_docstrings());
        assert!(Options::show_function_signatures());
        {
            let mut outer = Options::new();
            outer.disable_function_signatures();
            assert!(!Options::show_function_signatures());
            assert!(Options::show_user_defined_docstrings());
            {
                let mut inner = Options::new();
                inner.disable_all_docstrings();
                assert!(!Options::show_user_defined_docstrings());
                inner.enable_function_signatures();
                assert!(Options::show_function_signatures());
            }
            assert!(!Options::show_function_signatures());
            assert!(Options::show_user_defined_docstrings());
        }
        assert!(Options::show_function_signatures());
    }
}
