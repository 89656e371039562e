//! Package name and install-path helpers

/// Default directory holding installed third-party packages
pub const DEFAULT_THIRD_PARTY_DIR: &str = "node_modules";

const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Whether a specifier names a runtime builtin module
pub fn is_builtin_module(name: &str) -> bool {
    if name.starts_with("node:") {
        return true;
    }
    let root = name.split('/').next().unwrap_or(name);
    BUILTIN_MODULES.contains(&root)
}

/// Reduce an import specifier to its package name.
///
/// `@scope/pkg/sub/path` becomes `@scope/pkg`, `pkg/sub` becomes `pkg`.
/// Relative, absolute, URL and `node:` specifiers yield `None`.
pub fn package_name_from_specifier(specifier: &str) -> Option<String> {
    let spec = specifier.trim();
    if spec.is_empty()
        || spec.starts_with('.')
        || spec.starts_with('/')
        || spec.starts_with('#')
        || spec.starts_with('~')
        || spec.contains(':')
    {
        return None;
    }

    let mut parts = spec.split('/');
    let first = parts.next()?;
    let name = if first.starts_with('@') {
        let second = parts.next().filter(|s| !s.is_empty())?;
        format!("{first}/{second}")
    } else {
        first.to_string()
    };

    is_valid_package_name(&name).then_some(name)
}

/// Loose validity check for registry package names
pub fn is_valid_package_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 214 {
        return false;
    }
    let body = match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, pkg)) if !scope.is_empty() && !pkg.is_empty() => {
                return valid_segment(scope) && valid_segment(pkg);
            }
            _ => return false,
        },
        None => name,
    };
    valid_segment(body)
}

fn valid_segment(segment: &str) -> bool {
    !segment.starts_with('.')
        && !segment.starts_with('_')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '!'))
}

/// Strip the scope from a package name: `@scope/foo` becomes `foo`
pub fn unscoped(name: &str) -> &str {
    match name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((_, pkg)) => pkg,
        None => name,
    }
}

/// Whether a package name is scoped
pub fn is_scoped(name: &str) -> bool {
    name.starts_with('@') && name.contains('/')
}

/// The package owning a file inside the third-party dir.
///
/// For nested installs the innermost package wins:
/// `a/node_modules/x/node_modules/@s/y/lib.js` belongs to `@s/y`.
/// pnpm's virtual store directory is skipped.
pub fn third_party_package(path: &str, third_party_dir: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    let idx = segments.iter().rposition(|s| *s == third_party_dir)?;
    let rest = &segments[idx + 1..];
    let first = rest.first().filter(|s| !s.is_empty() && !s.starts_with('.'))?;
    // A bare file directly inside the dir (e.g. `node_modules/index.js`).
    if rest.len() < 2 {
        return None;
    }
    let name = if first.starts_with('@') {
        let second = rest.get(1)?;
        if rest.len() < 3 {
            return None;
        }
        format!("{first}/{second}")
    } else {
        first.to_string()
    };
    is_valid_package_name(&name).then_some(name)
}

/// Path of a file relative to its owning package root, if inside the third-party dir
pub fn path_within_package<'a>(path: &'a str, name: &str, third_party_dir: &str) -> Option<&'a str> {
    let marker = format!("{third_party_dir}/{name}/");
    let idx = path.rfind(&marker)?;
    Some(&path[idx + marker.len()..])
}

/// How many third-party dirs deep a path sits (0 = application code)
pub fn third_party_depth(path: &str, third_party_dir: &str) -> usize {
    path.split('/').filter(|s| *s == third_party_dir).count()
}

/// Whether a path lies inside the third-party dir
pub fn is_third_party_path(path: &str, third_party_dir: &str) -> bool {
    third_party_depth(path, third_party_dir) > 0
}
