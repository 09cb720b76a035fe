#[cfg(windows)]
fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

#[cfg(not(windows))]
fn is_separator(c: char) -> bool {
    c == '/'
}

#[cfg(windows)]
const SEPARATOR: &str = "\\";

#[cfg(not(windows))]
const SEPARATOR: &str = "/";

/// Components of a location, split on the platform's separators. Empty
/// components (leading, trailing or doubled separators) are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegments<'a> {
    segments: Vec<&'a str>,
}

impl<'a> PathSegments<'a> {
    pub fn of(location: &'a str) -> Self {
        Self {
            segments: location
                .split(is_separator)
                .filter(|segment| !segment.is_empty())
                .collect(),
        }
    }

    /// Splits into the ancestor segments and the final segment.
    pub fn split_last(&self) -> Option<(&'a str, &[&'a str])> {
        self.segments
            .split_last()
            .map(|(name, parents)| (*name, parents))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.segments.iter().copied()
    }
}

/// Location of the child `name` of the node at `parent`. The root's location
/// is the empty string.
pub fn child_location(parent: &str, name: &str) -> String {
    if parent.is_empty() && cfg!(windows) {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}
