//! Deferred values.
//!
//! An [`Output`] is a value that is not known when a resource is declared:
//! a generated name, an endpoint, an instrumentation key. It starts pending
//! and is settled exactly once, either with a value or with an
//! [`OutputError`], when the provisioning backend answers.
//!
//! Dependent values are built with combinators instead of being read:
//!
//! - [`Output::map`] / [`Output::try_map`]: transform a single value
//! - [`Output::all`]: combine an ordered list of values
//! - [`Output::zip`]: combine two values of different types
//! - [`Output::concat`]: concatenate strings and string outputs
//!
//! A combinator registers a continuation on its sources. The continuation
//! runs once, when the last source settles, so transformation functions are
//! invoked exactly once and never before their inputs are known. If a source
//! fails, the derived value fails with the same error and the transformation
//! is not invoked.
//!
//! Every output also tracks the logical names of the resources it was derived
//! from (used to build the dependency graph) and whether it carries secret
//! material (used for redaction).
//!
//! # Example
//!
//! ```
//! use appstack_lib::output::Output;
//!
//! let host = Output::known("web.azurewebsites.net".to_string());
//! let url = host.map(|host| format!("http://{host}"));
//! assert_eq!(url.peek(), Some(Ok("http://web.azurewebsites.net".to_string())));
//! ```

mod input;

pub use input::Input;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::consts::REDACTED;
use crate::resource::ResourceName;

/// Reasons a deferred value failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
  /// The resource producing the value failed to provision.
  #[error("resource {resource} failed: {message}")]
  Upstream { resource: ResourceName, message: String },

  /// The resource producing the value was skipped because a dependency failed.
  #[error("resource {resource} was skipped because {dependency} failed")]
  Skipped {
    resource: ResourceName,
    dependency: ResourceName,
  },

  /// The backend did not report the requested output property.
  #[error("resource {resource} has no output '{property}'")]
  MissingProperty { resource: ResourceName, property: String },

  /// The output property has an unexpected JSON type.
  #[error("output '{property}' of {resource} is not a {expected}")]
  UnexpectedType {
    resource: ResourceName,
    property: String,
    expected: &'static str,
  },

  /// A fallible transformation rejected its input.
  #[error("transform failed: {0}")]
  Transform(String),

  /// The deployment stopped before the value could resolve.
  #[error("deployment was abandoned before this value resolved")]
  Abandoned,
}

type Continuation<T> = Box<dyn FnOnce(&Result<T, OutputError>) + Send>;

enum State<T> {
  Pending(Vec<Continuation<T>>),
  Settled(Result<T, OutputError>),
}

struct Cell<T> {
  state: Mutex<State<T>>,
  dependencies: BTreeSet<ResourceName>,
  secret: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single-assignment deferred value.
///
/// Cloning an `Output` is cheap and yields another handle to the same cell.
pub struct Output<T> {
  cell: Arc<Cell<T>>,
}

impl<T> Clone for Output<T> {
  fn clone(&self) -> Self {
    Self {
      cell: Arc::clone(&self.cell),
    }
  }
}

impl<T: Clone + Send + 'static> Output<T> {
  fn from_state(state: State<T>, dependencies: BTreeSet<ResourceName>, secret: bool) -> Self {
    Self {
      cell: Arc::new(Cell {
        state: Mutex::new(state),
        dependencies,
        secret,
      }),
    }
  }

  /// A value that is already known.
  pub fn known(value: T) -> Self {
    Self::from_state(State::Settled(Ok(value)), BTreeSet::new(), false)
  }

  /// A known value that must be treated as secret.
  pub fn secret(value: T) -> Self {
    Self::from_state(State::Settled(Ok(value)), BTreeSet::new(), true)
  }

  /// A pending value depending on the given resources.
  ///
  /// Whoever creates a pending output is responsible for settling it.
  pub fn pending(dependencies: BTreeSet<ResourceName>, secret: bool) -> Self {
    Self::from_state(State::Pending(Vec::new()), dependencies, secret)
  }

  /// Logical names of the resources this value is derived from.
  pub fn dependencies(&self) -> &BTreeSet<ResourceName> {
    &self.cell.dependencies
  }

  /// Whether this value carries secret material.
  pub fn is_secret(&self) -> bool {
    self.cell.secret
  }

  /// Whether the value has been settled.
  pub fn is_settled(&self) -> bool {
    matches!(*lock(&self.cell.state), State::Settled(_))
  }

  /// Returns the settled result without waiting.
  pub fn peek(&self) -> Option<Result<T, OutputError>> {
    match &*lock(&self.cell.state) {
      State::Pending(_) => None,
      State::Settled(result) => Some(result.clone()),
    }
  }

  /// Settles the value and runs every registered continuation.
  ///
  /// Only the first call has an effect; returns false if the value was
  /// already settled.
  pub fn settle(&self, result: Result<T, OutputError>) -> bool {
    let waiting = {
      let mut state = lock(&self.cell.state);
      match &mut *state {
        State::Settled(_) => return false,
        State::Pending(waiting) => {
          let waiting = std::mem::take(waiting);
          *state = State::Settled(result.clone());
          waiting
        }
      }
    };

    // Continuations run outside the lock: they settle other cells and may
    // subscribe to this one again.
    for continuation in waiting {
      continuation(&result);
    }
    true
  }

  fn subscribe(&self, continuation: Continuation<T>) {
    let settled = {
      let mut state = lock(&self.cell.state);
      match &mut *state {
        State::Pending(waiting) => {
          waiting.push(continuation);
          return;
        }
        State::Settled(result) => result.clone(),
      }
    };
    continuation(&settled);
  }

  /// Waits for the value without blocking the thread.
  ///
  /// Returns [`OutputError::Abandoned`] if the cell is dropped while pending.
  pub async fn value(&self) -> Result<T, OutputError> {
    let (tx, rx) = oneshot::channel();
    self.subscribe(Box::new(move |result| {
      let _ = tx.send(result.clone());
    }));
    rx.await.unwrap_or(Err(OutputError::Abandoned))
  }

  /// Transforms the value once it resolves.
  pub fn map<U, F>(&self, f: F) -> Output<U>
  where
    U: Clone + Send + 'static,
    F: FnOnce(T) -> U + Send + 'static,
  {
    self.try_map(move |value| Ok(f(value)))
  }

  /// Transforms the value once it resolves; the transformation may fail.
  pub fn try_map<U, F>(&self, f: F) -> Output<U>
  where
    U: Clone + Send + 'static,
    F: FnOnce(T) -> Result<U, OutputError> + Send + 'static,
  {
    let derived = Output::pending(self.cell.dependencies.clone(), self.cell.secret);
    let target = derived.clone();
    self.subscribe(Box::new(move |result| {
      let next = match result {
        Ok(value) => f(value.clone()),
        Err(e) => Err(e.clone()),
      };
      target.settle(next);
    }));
    derived
  }

  /// Returns a handle to the same value flagged as secret.
  pub fn as_secret(&self) -> Output<T> {
    if self.cell.secret {
      return self.clone();
    }
    let derived = Output::pending(self.cell.dependencies.clone(), true);
    let target = derived.clone();
    self.subscribe(Box::new(move |result| {
      target.settle(result.clone());
    }));
    derived
  }

  /// Combines values into one resolving to the ordered list of inputs.
  ///
  /// The combined value resolves once every input has resolved, or fails
  /// with the first failure observed.
  pub fn all<I>(outputs: I) -> Output<Vec<T>>
  where
    I: IntoIterator<Item = Output<T>>,
  {
    let outputs: Vec<Output<T>> = outputs.into_iter().collect();
    let dependencies = outputs
      .iter()
      .flat_map(|output| output.cell.dependencies.iter().cloned())
      .collect();
    let secret = outputs.iter().any(Output::is_secret);
    let combined = Output::pending(dependencies, secret);

    if outputs.is_empty() {
      combined.settle(Ok(Vec::new()));
      return combined;
    }

    let slots: Arc<Mutex<(Vec<Option<T>>, usize)>> = Arc::new(Mutex::new((vec![None; outputs.len()], outputs.len())));

    for (index, output) in outputs.iter().enumerate() {
      let slots = Arc::clone(&slots);
      let target = combined.clone();
      output.subscribe(Box::new(move |result| match result {
        Err(e) => {
          target.settle(Err(e.clone()));
        }
        Ok(value) => {
          let ready = {
            let mut guard = lock(&slots);
            let (values, remaining) = &mut *guard;
            if values[index].is_none() {
              values[index] = Some(value.clone());
              *remaining -= 1;
            }
            if *remaining == 0 {
              Some(values.iter_mut().filter_map(Option::take).collect::<Vec<_>>())
            } else {
              None
            }
          };
          if let Some(values) = ready {
            target.settle(Ok(values));
          }
        }
      }));
    }

    combined
  }

  /// Combines two values of different types.
  pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
  where
    U: Clone + Send + 'static,
  {
    let dependencies = self
      .cell
      .dependencies
      .union(&other.cell.dependencies)
      .cloned()
      .collect();
    let combined = Output::pending(dependencies, self.is_secret() || other.is_secret());
    let pair: Arc<Mutex<(Option<T>, Option<U>)>> = Arc::new(Mutex::new((None, None)));

    {
      let pair = Arc::clone(&pair);
      let target = combined.clone();
      self.subscribe(Box::new(move |result| match result {
        Err(e) => {
          target.settle(Err(e.clone()));
        }
        Ok(value) => {
          let ready = {
            let mut guard = lock(&pair);
            guard.0 = Some(value.clone());
            take_pair(&mut guard)
          };
          if let Some(values) = ready {
            target.settle(Ok(values));
          }
        }
      }));
    }

    {
      let target = combined.clone();
      other.subscribe(Box::new(move |result| match result {
        Err(e) => {
          target.settle(Err(e.clone()));
        }
        Ok(value) => {
          let ready = {
            let mut guard = lock(&pair);
            guard.1 = Some(value.clone());
            take_pair(&mut guard)
          };
          if let Some(values) = ready {
            target.settle(Ok(values));
          }
        }
      }));
    }

    combined
  }
}

fn take_pair<A, B>(pair: &mut (Option<A>, Option<B>)) -> Option<(A, B)> {
  if pair.0.is_some() && pair.1.is_some() {
    Some((pair.0.take()?, pair.1.take()?))
  } else {
    None
  }
}

impl Output<String> {
  /// Concatenates literal strings and string outputs, in order.
  pub fn concat<I>(parts: I) -> Output<String>
  where
    I: IntoIterator,
    I::Item: Into<Input<String>>,
  {
    Output::all(parts.into_iter().map(|part| Into::<Input<String>>::into(part).into_output())).map(|parts| parts.concat())
  }
}

impl<T: fmt::Debug> fmt::Debug for Output<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = lock(&self.cell.state);
    let mut out = f.debug_struct("Output");
    match &*state {
      State::Pending(_) => out.field("state", &"pending"),
      State::Settled(Ok(_)) if self.cell.secret => out.field("value", &REDACTED),
      State::Settled(Ok(value)) => out.field("value", value),
      State::Settled(Err(e)) => out.field("error", e),
    };
    out.field("dependencies", &self.cell.dependencies).finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  fn deps(names: &[&str]) -> BTreeSet<ResourceName> {
    names.iter().map(|name| ResourceName::from(*name)).collect()
  }

  #[test]
  fn known_value_is_settled() {
    let output = Output::known(42);
    assert!(output.is_settled());
    assert_eq!(output.peek(), Some(Ok(42)));
    assert!(output.dependencies().is_empty());
  }

  #[test]
  fn map_runs_once_after_resolution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source: Output<String> = Output::pending(deps(&["web"]), false);

    let counter = Arc::clone(&calls);
    let derived = source.map(move |host| {
      counter.fetch_add(1, Ordering::SeqCst);
      format!("http://{host}")
    });
    let again = derived.map(|url| url.len());

    assert_eq!(calls.load(Ordering::SeqCst), 0, "transform must wait for the source");
    assert!(derived.peek().is_none());

    assert!(source.settle(Ok("web.azurewebsites.net".to_string())));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(derived.peek(), Some(Ok("http://web.azurewebsites.net".to_string())));
    assert_eq!(again.peek(), Some(Ok(28)));

    // Further reads and a rejected second settle never rerun the transform.
    let _ = derived.peek();
    assert!(!source.settle(Ok("other".to_string())));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn map_on_settled_value_runs_immediately() {
    let derived = Output::known(2).map(|n| n * 21);
    assert_eq!(derived.peek(), Some(Ok(42)));
  }

  #[test]
  fn failure_propagates_without_running_transform() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source: Output<i32> = Output::pending(deps(&["sql"]), false);
    let counter = Arc::clone(&calls);
    let derived = source.map(move |n| {
      counter.fetch_add(1, Ordering::SeqCst);
      n + 1
    });

    let error = OutputError::Upstream {
      resource: ResourceName::from("sql"),
      message: "quota exceeded".to_string(),
    };
    source.settle(Err(error.clone()));

    assert_eq!(derived.peek(), Some(Err(error)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn try_map_can_fail() {
    let derived = Output::known("abc".to_string()).try_map(|s| {
      s.parse::<u32>()
        .map_err(|e| OutputError::Transform(e.to_string()))
    });
    assert!(matches!(derived.peek(), Some(Err(OutputError::Transform(_)))));
  }

  #[test]
  fn all_preserves_input_order() {
    let a: Output<String> = Output::pending(deps(&["a"]), false);
    let b: Output<String> = Output::pending(deps(&["b"]), false);
    let c = Output::known("c".to_string());

    let combined = Output::all(vec![a.clone(), b.clone(), c]);
    assert_eq!(combined.dependencies(), &deps(&["a", "b"]));

    b.settle(Ok("b".to_string()));
    assert!(combined.peek().is_none(), "must wait for every input");
    a.settle(Ok("a".to_string()));

    assert_eq!(
      combined.peek(),
      Some(Ok(vec!["a".to_string(), "b".to_string(), "c".to_string()]))
    );
  }

  #[test]
  fn all_of_nothing_resolves_empty() {
    let combined: Output<Vec<i32>> = Output::all(Vec::new());
    assert_eq!(combined.peek(), Some(Ok(Vec::new())));
  }

  #[test]
  fn all_fails_with_first_error() {
    let a: Output<i32> = Output::pending(deps(&["a"]), false);
    let b: Output<i32> = Output::pending(deps(&["b"]), false);
    let combined = Output::all(vec![a.clone(), b.clone()]);

    a.settle(Err(OutputError::Abandoned));
    b.settle(Ok(1));
    assert_eq!(combined.peek(), Some(Err(OutputError::Abandoned)));
  }

  #[test]
  fn zip_waits_for_both_sides() {
    let name: Output<String> = Output::pending(deps(&["app"]), false);
    let group: Output<String> = Output::pending(deps(&["rg"]), false);
    let pair = name.zip(&group);

    name.settle(Ok("appservice-as".to_string()));
    assert!(pair.peek().is_none());
    group.settle(Ok("appservicerg".to_string()));

    assert_eq!(
      pair.peek(),
      Some(Ok(("appservice-as".to_string(), "appservicerg".to_string())))
    );
    assert_eq!(pair.dependencies(), &deps(&["app", "rg"]));
  }

  #[test]
  fn concat_joins_literals_and_outputs() {
    let account: Output<String> = Output::pending(deps(&["sa"]), false);
    let url = Output::concat([
      Input::from("https://"),
      Input::from(&account),
      Input::from(".blob.core.windows.net/"),
    ]);

    account.settle(Ok("appservicesa".to_string()));
    assert_eq!(url.peek(), Some(Ok("https://appservicesa.blob.core.windows.net/".to_string())));
  }

  #[test]
  fn secrecy_propagates_through_combinators() {
    let password = Output::secret("p4ssw0rd!".to_string());
    let server = Output::known("sql".to_string());

    assert!(password.map(|p| p.len()).is_secret());
    assert!(Output::all(vec![server.clone(), password.clone()]).is_secret());
    assert!(server.zip(&password).is_secret());
    assert!(!server.map(|s| s.len()).is_secret());
    assert!(server.as_secret().is_secret());
  }

  #[test]
  fn debug_redacts_secret_values() {
    let password = Output::secret("p4ssw0rd!".to_string());
    let rendered = format!("{password:?}");
    assert!(rendered.contains("[secret]"));
    assert!(!rendered.contains("p4ssw0rd"));
  }

  #[tokio::test]
  async fn value_waits_for_settlement() {
    let source: Output<u32> = Output::pending(deps(&["ai"]), false);
    let waiter = {
      let source = source.clone();
      tokio::spawn(async move { source.value().await })
    };

    tokio::task::yield_now().await;
    source.settle(Ok(7));

    assert_eq!(waiter.await.unwrap(), Ok(7));
  }
}
