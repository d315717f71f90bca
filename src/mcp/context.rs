//! Request-scoped "current session" slot
//!
//! The slot only exists inside [`scope`]. It is created empty when the scope is
//! entered and dropped when the scoped future completes or unwinds, so a warm
//! process serving unrelated requests never observes a previous caller's
//! session id.

use std::{cell::RefCell, future::Future};

tokio::task_local! {
    static CURRENT_SESSION: RefCell<Option<String>>;
}

pub async fn scope<F: Future>(future: F) -> F::Output {
    CURRENT_SESSION.scope(RefCell::new(None), future).await
}

pub fn current_session_id() -> Option<String> {
    CURRENT_SESSION
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Binds `session_id` to the running request. Returns `false` outside [`scope`].
pub fn set_current_session_id(session_id: impl Into<String>) -> bool {
    let session_id = session_id.into();
    CURRENT_SESSION
        .try_with(|slot| {
            slot.replace(Some(session_id));
        })
        .is_ok()
}
