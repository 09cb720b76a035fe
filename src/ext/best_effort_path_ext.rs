use std::path::{Component, Path, PathBuf};

/// Makes `path` absolute against the current directory and resolves `.` and
/// `..` lexically. Symlinks are left alone, so the result is a stable cache
/// key rather than a canonical path.
pub fn best_effort_absolute_path(path: &Path) -> PathBuf {
    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(current_dir) => current_dir.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    normalize_path(&absolute_path)
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_absolute_path(self).display().to_string()
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        self.as_path().best_effort_path_display()
    }
}

impl BestEffortPathExt for &str {
    fn best_effort_path_display(&self) -> String {
        Path::new(self).best_effort_path_display()
    }
}

impl BestEffortPathExt for String {
    fn best_effort_path_display(&self) -> String {
        Path::new(self).best_effort_path_display()
    }
}
