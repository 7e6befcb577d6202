///! Debug-mode call stack, used to annotate reported errors with the
///! routine chain active when they were raised. Compiled out entirely in
///! release builds (`cfg(debug_assertions)`), matching the source's own
///! `PushCallStack` / `PopCallStack` / `DumpCallStack` split between debug
///! and release builds.

#[cfg(debug_assertions)]
use std::cell::RefCell;

#[cfg(debug_assertions)]
thread_local! {
    static STACK: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
}

/// RAII guard pushing `name` onto the call stack on construction and
/// popping it on drop. Use via [`enter`].
#[cfg(debug_assertions)]
pub struct Frame;

#[cfg(debug_assertions)]
impl Drop for Frame {
    fn drop(&mut self) {
        STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

#[cfg(not(debug_assertions))]
pub struct Frame;

/// Push `name` onto the current thread's call stack; the returned guard
/// pops it again when dropped.
#[cfg(debug_assertions)]
pub fn enter(name: &'static str) -> Frame {
    STACK.with(|s| s.borrow_mut().push(name));
    Frame
}

#[cfg(not(debug_assertions))]
pub fn enter(_name: &'static str) -> Frame {
    Frame
}

/// Render the current call stack as `"outer > inner > innermost"`.
/// Empty string if no frames are active, or in release builds.
#[cfg(debug_assertions)]
pub fn dump() -> String {
    STACK.with(|s| s.borrow().join(" > "))
}

#[cfg(not(debug_assertions))]
pub fn dump() -> String {
    String::new()
}
