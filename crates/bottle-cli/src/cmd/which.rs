//! Which command

use anyhow::{Context, Result, bail};
use bottle_core::{Discovery, Settings, paths};
use std::path::Path;

/// Print the package containing `path`.
pub fn which(settings: &Settings, path: &Path, root: bool) -> Result<()> {
    println!("{}", describe(settings, path, root)?);
    Ok(())
}

/// `[<package name>] <directory>`, where the directory is the project
/// directory, or the package's source root when `root` is set.
pub fn describe(settings: &Settings, path: &Path, root: bool) -> Result<String> {
    let path = paths::absolute(path);
    if !path.exists() {
        bail!("the file '{}' does not exist", path.display());
    }
    let dir = if path.is_file() {
        path.parent().unwrap_or(&path).to_path_buf()
    } else if path.is_dir() {
        path
    } else {
        bail!("the file '{}' is not a regular file or directory", path.display());
    };

    let cfg = Discovery::new(settings)
        .find(&dir)
        .context("could not find Bottle.toml or GOPATH")?;
    let shown = if root { &cfg.package_root } else { &cfg.project };
    Ok(format!("[{}] {}", cfg.package.name, shown.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_describe_file_in_nested_package() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("app");
        fs::create_dir_all(project.join("src/cmd")).unwrap();
        fs::write(
            project.join("Bottle.toml"),
            "[package]\nname = \"example.com/app\"\nroot = \"src\"\n",
        )
        .unwrap();
        let file = project.join("src/cmd/main.go");
        fs::write(&file, "package main\n").unwrap();

        let settings = Settings::default();
        assert_eq!(
            describe(&settings, &file, false).unwrap(),
            format!("[example.com/app] {}", project.display())
        );
        assert_eq!(
            describe(&settings, &file, true).unwrap(),
            format!("[example.com/app] {}", project.join("src").display())
        );
    }

    #[test]
    fn test_describe_missing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let err = describe(&Settings::default(), &tmp.path().join("nope"), false).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
