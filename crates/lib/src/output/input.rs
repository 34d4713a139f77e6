use super::Output;

/// An input to a resource: either a literal or a deferred value.
#[derive(Debug, Clone)]
pub enum Input<T> {
  /// A value known at declaration time.
  Value(T),
  /// A value produced by another resource.
  Output(Output<T>),
}

impl<T: Clone + Send + 'static> Input<T> {
  /// A literal input that must be treated as secret.
  pub fn secret(value: T) -> Self {
    Input::Output(Output::secret(value))
  }

  /// Lifts the input into a deferred value.
  pub fn into_output(self) -> Output<T> {
    match self {
      Input::Value(value) => Output::known(value),
      Input::Output(output) => output,
    }
  }
}

impl<T> From<Output<T>> for Input<T> {
  fn from(output: Output<T>) -> Self {
    Input::Output(output)
  }
}

impl<T> From<&Output<T>> for Input<T> {
  fn from(output: &Output<T>) -> Self {
    Input::Output(output.clone())
  }
}

impl From<&str> for Input<String> {
  fn from(value: &str) -> Self {
    Input::Value(value.to_string())
  }
}

impl From<String> for Input<String> {
  fn from(value: String) -> Self {
    Input::Value(value)
  }
}

impl From<bool> for Input<bool> {
  fn from(value: bool) -> Self {
    Input::Value(value)
  }
}

impl From<i64> for Input<i64> {
  fn from(value: i64) -> Self {
    Input::Value(value)
  }
}
