//! Secret reference resolver.
//!
//! Values in `config.toml` can use special prefixes to reference secrets
//! stored outside the file:
//!
//! - `env::VAR_NAME` reads `$VAR_NAME` from the environment
//! - `file::PATH` reads the first line of a file (`~/` is expanded)
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - anything else is returned as-is

use std::path::PathBuf;

/// Resolves a value that may contain a secret reference prefix.
pub fn resolve(value: &str) -> Result<String, String> {
    if let Some(var) = value.strip_prefix("env::") {
        resolve_env(var)
    } else if let Some(path) = value.strip_prefix("file::") {
        resolve_file(path)
    } else if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else {
        Ok(value.to_string())
    }
}

/// Returns true if the value is a reference rather than a literal.
pub fn is_reference(value: &str) -> bool {
    ["env::", "file::", "pass::"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

fn resolve_env(var: &str) -> Result<String, String> {
    std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

fn resolve_file(path: &str) -> Result<String, String> {
    let path = expand_home(path);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("failed to read secret file {}: {}", path.display(), e))?;
    content
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| format!("secret file {} is empty", path.display()))
}

/// Runs `pass show <path>` and returns the first line of stdout.
fn resolve_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {}` failed (exit {}): {}",
            path,
            output.status,
            stderr.trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
        assert!(!is_reference("xxx.apps.googleusercontent.com"));
    }

    #[test]
    fn env_prefix_resolves() {
        unsafe {
            std::env::set_var("_CALHOOK_TEST_SECRET", "my-secret-value");
        }
        assert!(is_reference("env::_CALHOOK_TEST_SECRET"));
        assert_eq!(resolve("env::_CALHOOK_TEST_SECRET").unwrap(), "my-secret-value");
        unsafe {
            std::env::remove_var("_CALHOOK_TEST_SECRET");
        }
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let result = resolve("env::_CALHOOK_NONEXISTENT_VAR_12345");
        assert!(result.unwrap_err().contains("not set"));
    }

    #[test]
    fn file_prefix_reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "s3cret\nignored\n").unwrap();

        let value = resolve(&format!("file::{}", path.display())).unwrap();
        assert_eq!(value, "s3cret");
    }

    #[test]
    fn file_prefix_errors() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::write(&empty, "").unwrap();

        assert!(resolve(&format!("file::{}", empty.display())).unwrap_err().contains("empty"));
        assert!(resolve("file::/nonexistent/calhook/secret").is_err());
    }

    #[test]
    fn pass_prefix_unknown_entry_errors() {
        let result = resolve("pass::nonexistent/entry/that/should/not/exist/12345");
        assert!(result.is_err());
    }
}
