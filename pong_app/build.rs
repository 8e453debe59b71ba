// build.rs
// Compiles the sprite shaders to SPIR-V under <workspace>/target/shaders

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 2] = ["vert", "frag"];

/// Whether `source` is newer than `output` (or `output` is missing)
fn needs_compile(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();

    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

/// Compile every stage in `shader_dir`; returns how many were rebuilt
fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &Path) -> usize {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            println!("cargo:warning=No shader directory found at {}", shader_dir.display());
            return 0;
        }
    };

    let mut compiled = 0;
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        let is_stage = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_stage {
            continue;
        }

        // sprite.vert -> sprite.vert.spv
        let out_file = target_dir.join(format!("{file_name}.spv"));
        if !needs_compile(&path, &out_file) {
            continue;
        }

        match Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status() {
            Ok(status) if status.success() => compiled += 1,
            Ok(status) => println!(
                "cargo:warning=glslc failed for {file_name} with exit code {}",
                status.code().unwrap_or(-1)
            ),
            Err(e) => println!("cargo:warning=Failed to run glslc for {file_name}: {e}"),
        }
    }
    compiled
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let workspace_dir = manifest_dir.parent().map_or_else(|| manifest_dir.clone(), Path::to_path_buf);
    let shader_dir = workspace_dir.join("resources/shaders");

    println!("cargo:rerun-if-changed={}", shader_dir.display());
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        return;
    }

    let glslc = match env::var("VULKAN_SDK") {
        Ok(sdk) if cfg!(target_os = "windows") => PathBuf::from(sdk).join("Bin").join("glslc.exe"),
        Ok(sdk) => PathBuf::from(sdk).join("bin").join("glslc"),
        Err(_) => {
            println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    if !glslc.exists() {
        println!("cargo:warning=glslc not found at {}", glslc.display());
        return;
    }

    let target_dir = workspace_dir.join("target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {e}", target_dir.display());
        return;
    }

    let compiled = compile_shaders(&shader_dir, &target_dir, &glslc);
    if compiled > 0 {
        eprintln!("info: Compiled {compiled} shader(s) into {}", target_dir.display());
    }
}
