use super::*;
use core::fmt;

pub const PATH_SEPARATOR: char = '/';

/// The logical path from a volume root to the current directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FsPath {
    components: Vec<String>,
}

impl FsPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns true if this is the root path
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Applies one directory change: `.` stays, `..` pops, anything else pushes
    pub fn enter(&mut self, name: &str) {
        match name {
            "." | "" => {}
            ".." => {
                self.components.pop();
            }
            _ => self.components.push(name.into()),
        }
    }

    pub fn clear(&mut self) {
        self.components.clear();
    }

    /// Returns the last component, if any
    pub fn filename(&self) -> Option<&str> {
        self.components.last().map(|c| c.as_str())
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "{}", PATH_SEPARATOR);
        }
        for component in &self.components {
            write!(f, "{}{}", PATH_SEPARATOR, component)?;
        }
        Ok(())
    }
}

/// Splits `name` at its last `.` when the extension has at most three
/// characters; otherwise the whole name is the base.
pub fn split_extension(name: &[u8]) -> (&[u8], &[u8]) {
    match name.iter().rposition(|b| *b == b'.') {
        Some(dot) if name.len() - dot - 1 <= 3 => (&name[..dot], &name[dot + 1..]),
        _ => (name, &[]),
    }
}
