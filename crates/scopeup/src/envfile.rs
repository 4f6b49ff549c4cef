//! `KEY=VALUE` environment-file patching.
//!
//! The workspace templates ship with defaults; each instance overlays its
//! derived values on top without touching anything else. The merge is a
//! read-merge-write: existing keys win only when explicitly overridden,
//! and the output is deterministic so patching twice with the same
//! overrides is a no-op.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use tokio::io::AsyncWriteExt;

pub fn parse(content: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        out.insert(key.to_string(), value.to_string());
    }
    out
}

pub fn render(envs: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in envs {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Merges `overrides` into the env file at `path`. Keys not present in
/// `overrides` keep their current value. The file is replaced atomically.
pub async fn patch(path: &Path, overrides: &BTreeMap<String, String>) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read env file {}", path.display()))?;

    let mut envs = parse(&content);
    for (key, value) in overrides {
        envs.insert(key.clone(), value.clone());
    }

    let tmp = path.with_extension("tmp");
    let mut f = tokio::fs::File::create(&tmp)
        .await
        .with_context(|| format!("create {}", tmp.display()))?;
    f.write_all(render(&envs).as_bytes())
        .await
        .context("write env file")?;
    f.flush().await.ok();
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("persist env file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let envs = parse("# comment\n\nFOO=bar\nBAZ=qux\n");
        assert_eq!(envs.len(), 2);
        assert_eq!(envs["FOO"], "bar");
        assert_eq!(envs["BAZ"], "qux");
    }

    #[test]
    fn parse_strips_quotes() {
        let envs = parse("A=\"quoted\"\nB='single'\nC=plain=with=equals\n");
        assert_eq!(envs["A"], "quoted");
        assert_eq!(envs["B"], "single");
        assert_eq!(envs["C"], "plain=with=equals");
    }

    #[test]
    fn render_is_sorted_and_stable() {
        let envs = overrides(&[("B", "2"), ("A", "1")]);
        assert_eq!(render(&envs), "A=1\nB=2\n");
    }

    #[tokio::test]
    async fn patch_overwrites_and_preserves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.env");
        tokio::fs::write(&path, "KEEP=original\nREPLACE=old\n")
            .await
            .unwrap();

        patch(&path, &overrides(&[("REPLACE", "new"), ("ADDED", "yes")]))
            .await
            .unwrap();

        let envs = parse(&tokio::fs::read_to_string(&path).await.unwrap());
        assert_eq!(envs["KEEP"], "original");
        assert_eq!(envs["REPLACE"], "new");
        assert_eq!(envs["ADDED"], "yes");
    }

    #[tokio::test]
    async fn patch_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.env");
        tokio::fs::write(&path, "FOO=bar\nBAZ=qux\n").await.unwrap();

        let ov = overrides(&[("FOO", "patched")]);
        patch(&path, &ov).await.unwrap();
        let once = tokio::fs::read_to_string(&path).await.unwrap();
        patch(&path, &ov).await.unwrap();
        let twice = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn patch_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = patch(&dir.path().join("absent.env"), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("read env file"));
    }
}
