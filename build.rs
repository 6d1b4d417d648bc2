use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Copy the entity database and config to the target directory
    copy_data();
    copy_config();
}

/// Returns target/release (or target/debug) from OUT_DIR.
fn target_dir() -> std::path::PathBuf {
    let out_dir = env::var("OUT_DIR").unwrap();
    // OUT_DIR is something like target/release/build/bazaar-lens-xxx/out
    Path::new(&out_dir)
        .ancestors()
        .nth(3) // Go up 3 levels: out -> hash -> build -> release
        .expect("Could not find target directory")
        .to_path_buf()
}

/// Copies the data folder so the executable can find the entity database.
fn copy_data() {
    let data_src = Path::new("data");
    let data_dst = target_dir().join("data");

    if data_src.exists() {
        copy_dir_recursive(data_src, &data_dst);
        println!("cargo:rerun-if-changed=data/");
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let file_name = src_path.file_name().unwrap();
            let dst_path = dst.join(file_name);

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

/// Copies config.json to the target directory.
fn copy_config() {
    let config_src = Path::new("config.json");
    let config_dst = target_dir().join("config.json");

    if config_src.exists() {
        let _ = fs::copy(config_src, &config_dst);
        println!("cargo:rerun-if-changed=config.json");
    }
}
