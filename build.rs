use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // Copy templates and config next to the executable
    let Some(target_dir) = target_dir() else {
        println!("cargo:warning=Could not find target directory; resources not copied");
        return;
    };
    copy_templates(&target_dir);
    copy_config(&target_dir);
}

/// OUT_DIR is something like target/release/build/card-assistant-xxx/out.
/// Going up 3 levels (out -> hash -> build) gives target/release.
fn target_dir() -> Option<PathBuf> {
    let out_dir = env::var("OUT_DIR").ok()?;
    Path::new(&out_dir).ancestors().nth(3).map(Path::to_path_buf)
}

/// Copies the template folder so the executable can find reference images.
fn copy_templates(target_dir: &Path) {
    let template_src = Path::new("resources/template");
    let template_dst = target_dir.join("resources").join("template");

    if template_src.exists() {
        copy_dir_recursive(template_src, &template_dst);
        println!("cargo:rerun-if-changed=resources/template/");
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let dst_path = dst.join(entry.file_name());

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

fn copy_config(target_dir: &Path) {
    let config_src = Path::new("config.json");
    if config_src.exists() {
        let _ = fs::copy(config_src, target_dir.join("config.json"));
        println!("cargo:rerun-if-changed=config.json");
    }
}
