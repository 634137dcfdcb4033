//! Event handlers views bind to elements through `data-action`.

use std::rc::Rc;

/// Event handler registered by a view through [`Scope::action`](crate::Scope::action).
pub type Action = Rc<dyn Fn()>;

/// Macro to create event handlers that capture handles and execute a block
///
/// Usage examples:
/// ```rust
/// use tally::{Store, action};
///
/// let store = Store::new();
///
/// // Auto-captures the handle with the same name
/// let bump = action!(store => {
///     let _ = store.mutate::<i64, _>("count", |c| c.map(|c| c + 1), false);
/// });
///
/// // Custom variable names
/// let reset = action!(store as s => {
///     let _ = s.set("count", &0_i64, false);
/// });
///
/// bump();
/// reset();
/// ```
#[macro_export]
macro_rules! action {
    // Single handle, auto-capture with same name
    ($handle:ident => $body:block) => {
        {
            let $handle = $handle.clone();
            ::std::rc::Rc::new(move || $body) as $crate::Action
        }
    };

    // Multiple handles, auto-capture with same names
    ($($handle:ident),+ => $body:block) => {
        {
            $(let $handle = $handle.clone();)+
            ::std::rc::Rc::new(move || $body) as $crate::Action
        }
    };

    // Single handle with custom variable name
    ($handle:ident as $captured:ident => $body:block) => {
        {
            let $captured = $handle.clone();
            ::std::rc::Rc::new(move || $body) as $crate::Action
        }
    };

    // Multiple handles with custom variable names
    ($($handle:ident as $captured:ident),+ => $body:block) => {
        {
            $(let $captured = $handle.clone();)+
            ::std::rc::Rc::new(move || $body) as $crate::Action
        }
    };
}
