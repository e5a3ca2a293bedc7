//! Argument construction and command-line quoting
//!
//! Tool invocations are assembled from heterogeneous pieces: verbs, paths,
//! optional flags, numbers and nested lists of identifiers. [`Argument`]
//! captures all of them, [`flatten`] turns a tree of arguments into the flat
//! token list handed to the OS, and [`quote`] renders a single token so it
//! survives a shell-style command line.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// A single command-line argument value, possibly nested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A plain token
    Text(String),
    /// A nested sequence, flattened in order
    List(Vec<Argument>),
    /// No value; contributes nothing
    Absent,
}

impl Argument {
    /// Returns true if flattening this argument yields no tokens
    pub fn is_empty(&self) -> bool {
        match self {
            Argument::Text(text) => text.is_empty(),
            Argument::List(items) => items.iter().all(Argument::is_empty),
            Argument::Absent => true,
        }
    }

    fn collect_into(self, out: &mut Vec<String>) {
        match self {
            Argument::Text(text) if !text.is_empty() => out.push(text),
            Argument::Text(_) | Argument::Absent => {}
            Argument::List(items) => {
                for item in items {
                    item.collect_into(out);
                }
            }
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_owned())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Text(value)
    }
}

impl From<&String> for Argument {
    fn from(value: &String) -> Self {
        Argument::Text(value.clone())
    }
}

impl From<&Path> for Argument {
    fn from(value: &Path) -> Self {
        Argument::Text(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Argument {
    fn from(value: PathBuf) -> Self {
        Argument::from(value.as_path())
    }
}

impl From<&PathBuf> for Argument {
    fn from(value: &PathBuf) -> Self {
        Argument::from(value.as_path())
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Text(if value { "true" } else { "false" }.to_owned())
    }
}

macro_rules! number_argument {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Argument::Text(value.to_string())
                }
            }
        )*
    };
}

number_argument!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map_or(Argument::Absent, Into::into)
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(value: Vec<T>) -> Self {
        Argument::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Argument>, const N: usize> From<[T; N]> for Argument {
    fn from(value: [T; N]) -> Self {
        Argument::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Argument> + Clone> From<&[T]> for Argument {
    fn from(value: &[T]) -> Self {
        Argument::List(value.iter().cloned().map(Into::into).collect())
    }
}

/// Build an [`Argument::List`] from heterogeneous values
///
/// ```
/// use command_executor::args;
///
/// let schema: Option<&str> = None;
/// let tokens = command_executor::args::flatten([args!["DATA", "EXPORT", "--schemas", schema, 5]]);
/// assert_eq!(tokens, vec!["DATA", "EXPORT", "--schemas", "5"]);
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        $crate::args::Argument::List(vec![$($crate::args::Argument::from($arg)),*])
    };
}

/// Flatten nested arguments into an ordered token list
///
/// Absent values and empty strings anywhere in the tree are dropped rather
/// than becoming empty arguments.
pub fn flatten<I, A>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = A>,
    A: Into<Argument>,
{
    let mut out = Vec::new();
    for arg in args {
        arg.into().collect_into(&mut out);
    }
    out
}

/// Quote a token for placement on a command line
///
/// Tokens containing a space or a double quote are wrapped in double quotes
/// with backslashes and quotes escaped. All other tokens are returned as-is.
pub fn quote(token: &str) -> Cow<'_, str> {
    if !token.contains([' ', '"']) {
        return Cow::Borrowed(token);
    }

    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for ch in token.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

/// Render a program and its tokens as a single quoted command line
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = quote(program).into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&quote(arg.as_ref()));
    }
    line
}
