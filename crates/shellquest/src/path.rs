//! Path resolution for the virtual filesystem
//!
//! Pure string functions. They never fail: a malformed target degrades to the
//! best-effort absolute path, and `..` at the root is a silent no-op. Two
//! inputs with the same resolved segments always produce the identical string.

/// Home directory for a user.
pub fn home_dir(username: &str) -> String {
    format!("/home/{}", username)
}

/// Resolve `target` against `current` into a canonical absolute path.
///
/// - `~` is the user's home, `~/rest` is relative to it
/// - absolute targets are normalized
/// - relative targets are applied segment by segment to `current`
///
/// # Example
///
/// ```
/// use shellquest::path::resolve;
///
/// assert_eq!(resolve("/home/student", "docs/../notes", "student"), "/home/student/notes");
/// assert_eq!(resolve("/", "..", "student"), "/");
/// assert_eq!(resolve("/tmp", "~", "student"), "/home/student");
/// ```
pub fn resolve(current: &str, target: &str, username: &str) -> String {
    if target == "~" {
        return home_dir(username);
    }
    if let Some(rest) = target.strip_prefix("~/") {
        return push_segments(segments(&home_dir(username)), rest);
    }
    if target.starts_with('/') {
        return normalize(target);
    }
    push_segments(segments(current), target)
}

/// Normalize an absolute path: collapse empty and `.` segments, apply `..`,
/// drop the trailing slash.
pub fn normalize(path: &str) -> String {
    push_segments(Vec::new(), path)
}

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

fn push_segments<'a>(mut stack: Vec<&'a str>, target: &'a str) -> String {
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    join_segments(&stack)
}

fn join_segments(stack: &[&str]) -> String {
    if stack.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(stack.iter().map(|s| s.len() + 1).sum());
    for segment in stack {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Parent directory of a normalized absolute path. The root is its own parent.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Last segment of a path, or `/` for the root.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Join a directory and an entry name.
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// True if `path` is `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return true;
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}
