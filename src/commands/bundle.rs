//! Bundle command - pack the deployment manifest into a tarball
//!
//! Produces a gzip-compressed tar of exactly the declared artifact set, laid
//! out by target path. Useful for air-gapped targets where scp is not an
//! option: carry the tarball over and unpack it into the app dir.

use anyhow::{Context as AnyhowContext, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::BundleArgs;
use crate::config;
use crate::schema::SkiffConfig;
use crate::ui;

const DEFAULT_OUTPUT: &str = "skiff-bundle.tar.gz";

pub fn run(_ctx: &Context, args: BundleArgs) -> Result<()> {
    let config_dir = config::config_dir()?;
    let (config, _format) = config::load_config::<SkiffConfig>(&config_dir, "config")
        .context("Could not load skiff config")?;
    config.validate().context("Invalid skiff config")?;

    let root = std::env::current_dir().context("Could not determine working directory")?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let count = write_bundle(&config, &root, &output)?;

    ui::success(&format!(
        "Bundled {} file(s) into {}",
        count,
        output.display()
    ));
    ui::dim(&format!(
        "unpack with: tar -xzf {} -C {}",
        output.display(),
        config.target.app_dir
    ));
    Ok(())
}

/// Write the expanded artifact set into a tar.gz at `output`, entries named
/// by their target path. Returns the number of files archived.
fn write_bundle(config: &SkiffConfig, root: &Path, output: &Path) -> Result<usize> {
    let artifacts = config.manifest.expand(root)?;

    let file = File::create(output)
        .with_context(|| format!("Could not create {}", output.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);

    for artifact in &artifacts {
        archive
            .append_path_with_name(&artifact.source, &artifact.target)
            .with_context(|| format!("Could not archive {}", artifact.source.display()))?;
    }

    archive
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .context("Could not finalize archive")?;

    Ok(artifacts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ManifestConfig, TargetConfig};
    use flate2::read::GzDecoder;
    use std::fs;

    #[test]
    fn bundle_contains_artifacts_by_target_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "print('hi')").unwrap();
        fs::create_dir_all(dir.path().join("chat")).unwrap();
        fs::write(dir.path().join("chat/config.py"), "x = 1").unwrap();

        let config = SkiffConfig {
            target: TargetConfig {
                host: "vm".into(),
                user: "deploy".into(),
                key_file: "key".into(),
                app_dir: "/opt/chat".into(),
                service: "chat".into(),
                port: 8501,
            },
            manifest: ManifestConfig {
                files: vec!["app.py".into()],
                trees: vec!["chat".into()],
                ..Default::default()
            },
            ..Default::default()
        };

        let output = dir.path().join("out.tar.gz");
        let count = write_bundle(&config, dir.path(), &output).unwrap();
        assert_eq!(count, 2);

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&output).unwrap()));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"app.py".to_string()));
        assert!(names.contains(&"chat/config.py".to_string()));
    }

    #[test]
    fn bundle_fails_on_missing_manifest_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = SkiffConfig {
            target: TargetConfig {
                host: "vm".into(),
                user: "deploy".into(),
                key_file: "key".into(),
                app_dir: "/opt/chat".into(),
                service: "chat".into(),
                port: 8501,
            },
            manifest: ManifestConfig {
                files: vec!["missing.py".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let output = dir.path().join("out.tar.gz");
        assert!(write_bundle(&config, dir.path(), &output).is_err());
    }
}
