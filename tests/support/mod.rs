#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn featuregen_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_featuregen"))
}

pub fn feature_pack_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_feature-pack"))
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

/// Scratch directory holding a manifest and the catalogs it names.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("allocate workspace"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_json(&self, relative: &str, value: &Value) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, serde_json::to_vec_pretty(value).expect("serialize")).expect("write");
        path
    }

    pub fn write_manifest(&self, manifest: Value) -> PathBuf {
        self.write_json("featuregen.json", &manifest)
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join("generated").join(name)
    }

    pub fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.output(name))
            .unwrap_or_else(|err| panic!("reading {name}: {err}"))
    }

    pub fn state(&self) -> String {
        fs::read_to_string(self.dir.path().join(".featuregen_prev")).expect("state file")
    }
}

/// Core catalog: legacy, wrapper, one core-version structure, one promoted
/// duplicate and one extension.
pub fn core_catalog() -> Value {
    json!({
        "schema_version": "feature_catalog_v1",
        "edition": "vulkan_core",
        "structures": [
            {"name": "VkPhysicalDeviceFeatures", "origin": {"version": "1.0"},
             "features": ["robustBufferAccess", "geometryShader"]},
            {"name": "VkPhysicalDeviceFeatures2", "origin": {"version": "1.1"}},
            {"name": "VkPhysicalDeviceMultiviewFeatures", "origin": {"version": "1.1"},
             "features": ["multiview"]},
            {"name": "VkPhysicalDeviceVulkan11Features", "origin": {"version": "1.1"},
             "s_type": "VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_VULKAN_1_1_FEATURES",
             "features": ["multiview", "shaderDrawParameters"]},
            {"name": "VkPhysicalDeviceHostImageCopyFeaturesEXT",
             "origin": {"extension": "VK_EXT_host_image_copy"},
             "features": ["hostImageCopy"]}
        ]
    })
}

pub fn beta_catalog() -> Value {
    json!({
        "schema_version": "feature_catalog_v1",
        "edition": "vulkan_beta",
        "structures": [
            {"name": "VkPhysicalDevicePortabilitySubsetFeaturesKHR",
             "origin": {"extension": "VK_KHR_portability_subset"},
             "features": ["events", "triangleFans"]}
        ]
    })
}

/// Workspace with both catalogs and a two-variant manifest.
pub fn two_variant_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write_json("catalogs/vulkan_core.json", &core_catalog());
    ws.write_json("catalogs/vulkan_beta.json", &beta_catalog());
    ws.write_manifest(json!({
        "variants": [
            {"name": "vulkan_core", "catalog": "catalogs/vulkan_core.json"},
            {"name": "vulkan_beta", "catalog": "catalogs/vulkan_beta.json",
             "guard": "VK_ENABLE_BETA_EXTENSIONS"}
        ]
    }));
    ws
}
