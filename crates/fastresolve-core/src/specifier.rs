//! Import specifier classification.

use fastresolve_util::path;
use std::path::Path;

/// Package id a specifier refers to, used for `only` filtering.
///
/// - `lodash/fp` → `lodash`
/// - `@scope/pkg/sub` → `@scope/pkg`
/// - `./util` from `/src/a.js` → `/src/util` (relative specifiers are
///   classified by their absolute target so patterns can match real paths)
#[must_use]
pub fn package_id(specifier: &str, importer: &Path) -> String {
    let mut segments = specifier.split(|c| c == '/' || c == '\\');
    let first = segments.next().unwrap_or_default();

    if first.starts_with('@') {
        if let Some(name) = segments.next() {
            return format!("{first}/{name}");
        }
    } else if first.starts_with('.') {
        return path::resolve(path::parent_dir(importer), specifier)
            .to_string_lossy()
            .into_owned();
    }

    first.to_string()
}
