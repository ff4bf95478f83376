//! Name composition shared by the backends
//!
//! Local keys become `/`-joined, lexically normalized paths; S3 keys are
//! percent-encoded when rendered into object URLs.

/// Lexically normalize a `/`-separated path
///
/// Collapses repeated separators, drops `.` segments, and resolves `..`
/// against the preceding segment. A leading `..` is kept on relative paths
/// and dropped on rooted ones. The empty path normalizes to `.`.
pub(crate) fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join path elements with `/` and normalize the result
///
/// Empty elements are skipped; if every element is empty the result is the
/// empty string rather than `.`.
pub(crate) fn join<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if joined.is_empty() {
        joined
    } else {
        clean(&joined)
    }
}

/// Percent-encode an object key for use in a URL path
///
/// Each `/`-separated segment is encoded on its own so the separators survive,
/// matching the greedy label encoding S3 uses for keys.
#[cfg(feature = "s3")]
pub(crate) fn encode_object_key(key: &str) -> String {
    key.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}
