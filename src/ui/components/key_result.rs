/// Outcome of offering a key to a component.
///
/// Components return this to their parent view; only `NotHandled` lets the
/// parent try its own bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed, no event for parent to handle
  Handled,
  /// Key was consumed, here's an event for parent to process
  Event(T),
  /// Key was not consumed, parent should try next handler
  NotHandled,
}

impl<T> KeyResult<T> {
  pub fn is_consumed(&self) -> bool {
    !matches!(self, KeyResult::NotHandled)
  }
}
