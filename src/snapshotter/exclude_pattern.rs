/// File name pattern with `*` (any run of characters) and `?` (exactly one
/// character) wildcards. Patterns are matched against a single path segment,
/// never against a whole path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludePattern {
    pattern: Vec<char>,
}

impl ExcludePattern {
    pub fn new(pattern: impl AsRef<str>) -> Self {
        Self {
            pattern: pattern.as_ref().chars().collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.chars().collect::<Vec<_>>();
        let (mut p, mut n) = (0, 0);
        // Position of the last `*` seen and the name index it was tried against
        let mut backtrack: Option<(usize, usize)> = None;

        while n < name.len() {
            match self.pattern.get(p) {
                Some('*') => {
                    backtrack = Some((p, n));
                    p += 1;
                }
                Some(&c) if c == '?' || c == name[n] => {
                    p += 1;
                    n += 1;
                }
                _ => match backtrack {
                    Some((star, matched)) => {
                        p = star + 1;
                        n = matched + 1;
                        backtrack = Some((star, matched + 1));
                    }
                    None => return false,
                },
            }
        }

        self.pattern[p..].iter().all(|&c| c == '*')
    }
}

impl From<&str> for ExcludePattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<&String> for ExcludePattern {
    fn from(pattern: &String) -> Self {
        Self::new(pattern)
    }
}
