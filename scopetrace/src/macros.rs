/// Times the rest of the enclosing scope, emitting one `Complete` event
/// when the scope ends.
///
/// Expands to a named guard binding so the scope is not accidentally ended
/// by an expression-level temporary drop:
///
/// ```rust
/// fn handle_request() {
///     scopetrace::trace_scope!("app", "handle_request");
///     // work timed until the end of the function
/// }
/// # handle_request();
/// ```
#[macro_export]
macro_rules! trace_scope {
    ($category:expr, $name:expr) => {
        let _trace_scope_guard = $crate::scoped_event($category, $name);
    };
}
