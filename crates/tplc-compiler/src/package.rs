//! Package name discovery for the generated file.

use std::path::{Path, PathBuf};

use tplc_codegen::sanitize_ident;

use crate::error::{CompileError, CompileResult};
use crate::unit::discover;

/// Package clause the file at `out_path` must carry: the clause of the
/// first sibling `.go` file (sorted, tests skipped), or the directory's
/// base name when there is none.
pub fn lookup_package_name(out_path: &Path) -> CompileResult<String> {
    let dir = match out_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.is_dir() {
        return Err(lookup_error(out_path, format!("{} is not a directory", dir.display())));
    }

    let pattern = format!(
        "{}/*.go",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let siblings: Vec<PathBuf> = discover(&pattern)?
        .into_iter()
        .filter(|p| !p.to_string_lossy().ends_with("_test.go"))
        .collect();

    if let Some(first) = siblings.first() {
        let source = std::fs::read_to_string(first).map_err(|source| CompileError::Read {
            path: first.clone(),
            source,
        })?;
        let name = package_name_from_source(&source).ok_or_else(|| {
            lookup_error(out_path, format!("{} has no package clause", first.display()))
        })?;
        log::debug!("package {name} found in {}", first.display());
        return Ok(name);
    }

    let absolute = std::fs::canonicalize(&dir)
        .map_err(|e| lookup_error(out_path, format!("{}: {e}", dir.display())))?;
    let base = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| lookup_error(out_path, "output directory has no name".to_string()))?;
    let name = sanitize_ident(&base);
    log::debug!("no sibling Go files, package {name} from directory name");
    Ok(name)
}

fn lookup_error(path: &Path, reason: String) -> CompileError {
    CompileError::PackageLookup {
        path: path.to_path_buf(),
        reason,
    }
}

/// Identifier of the `package` clause of a Go source, skipping leading
/// comments and blank lines.
pub fn package_name_from_source(source: &str) -> Option<String> {
    let mut in_block_comment = false;
    for line in source.lines() {
        let mut rest = line.trim();
        loop {
            if in_block_comment {
                match rest.find("*/") {
                    Some(end) => {
                        rest = rest[end + 2..].trim_start();
                        in_block_comment = false;
                    }
                    None => break,
                }
            } else if let Some(after) = rest.strip_prefix("/*") {
                rest = after;
                in_block_comment = true;
            } else {
                break;
            }
        }
        if in_block_comment || rest.is_empty() || rest.starts_with("//") {
            continue;
        }
        let clause = rest.strip_prefix("package")?;
        if !clause.starts_with(char::is_whitespace) {
            return None;
        }
        let ident: String = clause
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        return (!ident.is_empty()).then_some(ident);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_clause() {
        assert_eq!(package_name_from_source("package views\n"), Some("views".into()));
    }

    #[test]
    fn comments_before_clause() {
        let src = "// Copyright\n\n/* multi\n line */\n// +build x\npackage views // trailing\n";
        assert_eq!(package_name_from_source(src), Some("views".into()));
        assert_eq!(
            package_name_from_source("/* a */ package inline\n"),
            Some("inline".into())
        );
    }

    #[test]
    fn code_before_clause_is_not_a_package() {
        assert_eq!(package_name_from_source("import \"fmt\"\npackage x\n"), None);
        assert_eq!(package_name_from_source("packagex\n"), None);
        assert_eq!(package_name_from_source(""), None);
    }
}
