//! Path decomposition: absolute paths <-> ordered segment lists.
//!
//! The first segment is the root: `/` for POSIX paths or a drive such as `c:`
//! for Windows paths. Every following segment is one path component.

use std::path::{Path, PathBuf};

const POSIX_ROOT: &str = "/";

fn is_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() > 1 && bytes[1] == b':'
}

/// Split an absolute path into its root segment followed by its components.
///
/// Empty components (repeated or trailing separators) and `.` are dropped.
/// Windows paths (`c:\a\b`) split on both separators and keep the drive as the
/// root segment.
pub fn split_abs_path(path: &str) -> Vec<String> {
    if is_drive(path) {
        let out = vec![path[..2].to_string()];
        return extend_components(out, &path[2..], |c| c == '/' || c == '\\');
    }
    match path.strip_prefix('/') {
        Some(rest) => extend_components(vec![POSIX_ROOT.to_string()], rest, |c| c == '/'),
        None => extend_components(Vec::new(), path, |c| c == '/'),
    }
}

fn extend_components(mut out: Vec<String>, rest: &str, sep: fn(char) -> bool) -> Vec<String> {
    out.extend(
        rest.split(sep)
            .filter(|part| !part.is_empty() && *part != ".")
            .map(str::to_string),
    );
    out
}

/// Join segments produced by [`split_abs_path`] back into a path string.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    let Some((root, rest)) = segments.split_first() else {
        return String::new();
    };
    let root = root.as_ref();
    let rest: Vec<&str> = rest.iter().map(AsRef::as_ref).collect();
    if root == POSIX_ROOT {
        format!("/{}", rest.join("/"))
    } else if is_drive(root) {
        format!("{}\\{}", root, rest.join("\\"))
    } else if rest.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, rest.join("/"))
    }
}

/// Make `path` absolute without touching the filesystem beyond the current
/// directory, so deleted paths can still be resolved.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    Ok(dunce::simplified(&absolute).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_posix_paths() {
        assert_eq!(split_abs_path("/a/b/c.txt"), vec!["/", "a", "b", "c.txt"]);
        assert_eq!(split_abs_path("/"), vec!["/"]);
        assert_eq!(split_abs_path("/a//b/./c/"), vec!["/", "a", "b", "c"]);
    }

    #[test]
    fn splits_windows_paths() {
        assert_eq!(
            split_abs_path("c:\\a\\b\\c.txt"),
            vec!["c:", "a", "b", "c.txt"]
        );
        assert_eq!(split_abs_path("D:/x/y"), vec!["D:", "x", "y"]);
    }

    #[test]
    fn joins_back() {
        assert_eq!(join_segments(&["/", "a", "b"]), "/a/b");
        assert_eq!(join_segments(&["/"]), "/");
        assert_eq!(join_segments(&["c:", "a", "b.txt"]), "c:\\a\\b.txt");
        assert_eq!(join_segments::<&str>(&[]), "");
    }

    #[test]
    fn absolutize_keeps_absolute_paths() {
        let path = Path::new("/tmp/does-not-exist/file.txt");
        assert_eq!(absolutize(path).unwrap(), path);
    }

    proptest! {
        #[test]
        fn posix_split_join_round_trip(parts in prop::collection::vec("[a-zA-Z0-9 _.=-]{1,12}", 0..8)) {
            let parts: Vec<String> = parts.into_iter().filter(|p| p != ".").collect();
            let path = format!("/{}", parts.join("/"));
            prop_assert_eq!(join_segments(&split_abs_path(&path)), path);
        }
    }
}
