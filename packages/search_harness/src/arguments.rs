use std::fmt::{self, Display, Formatter};

/// The ordered argument vector passed to the program under test.
///
/// Blank (empty or whitespace-only) entries are dropped on construction, so the program never
/// receives them.
///
/// # Example
///
/// ```
/// use search_harness::Arguments;
///
/// let arguments = Arguments::new(["-text", "", "input/text", "  ", "-threads", "3"]);
///
/// assert_eq!(arguments.len(), 4);
/// assert_eq!(arguments.to_string(), "-text input/text -threads 3");
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Arguments {
    values: Vec<String>,
}

impl Arguments {
    /// Creates an argument vector, dropping blank entries.
    #[must_use]
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        values.into_iter().map(Into::into).collect()
    }

    /// Creates an argument vector by splitting a single line on whitespace.
    ///
    /// Quoting is not supported; every whitespace-separated token becomes one argument.
    #[must_use]
    pub fn split_whitespace(line: &str) -> Self {
        Self::new(line.split_whitespace())
    }

    /// The arguments in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.values
    }

    /// The number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S> FromIterator<S> for Arguments
where
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(Into::into)
                .filter(|value| !value.trim().is_empty())
                .collect(),
        }
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return write!(f, "(none)");
        }

        write!(f, "{}", self.values.join(" "))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn blank_entries_are_removed() {
        let arguments = Arguments::new(["-index", "", " ", "\t", "output/index.json"]);

        assert_eq!(arguments.as_slice(), ["-index", "output/index.json"]);
    }

    #[test]
    fn order_is_preserved() {
        let arguments = Arguments::split_whitespace("-threads 3 -text input");

        assert_eq!(arguments.as_slice(), ["-threads", "3", "-text", "input"]);
    }

    #[test]
    fn empty_vector_displays_none() {
        let arguments = Arguments::new(Vec::<String>::new());

        assert!(arguments.is_empty());
        assert_eq!(arguments.to_string(), "(none)");
    }

    #[test]
    fn entries_are_kept_verbatim() {
        // Only blank entries are dropped; surrounding whitespace of real entries stays.
        let arguments = Arguments::new([" -query "]);

        assert_eq!(arguments.as_slice(), [" -query "]);
    }
}
