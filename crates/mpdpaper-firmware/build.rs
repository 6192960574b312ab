use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let sdkconfig_defaults = manifest_dir.join("sdkconfig.defaults");

    println!("cargo:rerun-if-changed=sdkconfig.defaults");

    if env::var("ESP_IDF_SDKCONFIG_DEFAULTS").is_err() {
        eprintln!("WARNING: ESP_IDF_SDKCONFIG_DEFAULTS not set! Stack size and PSRAM may be wrong.");
        eprintln!(
            "Build with: export ESP_IDF_SDKCONFIG_DEFAULTS=crates/mpdpaper-firmware/sdkconfig.defaults"
        );
    }

    // A cached sdkconfig older than the defaults hides their changes
    if let Ok(entries) = fs::read_dir(manifest_dir.join("target")) {
        for profile in entries.flatten().map(|entry| entry.path().join("build")) {
            let Ok(builds) = fs::read_dir(&profile) else {
                continue;
            };
            for build in builds.flatten().map(|entry| entry.path()) {
                if build.to_string_lossy().contains("esp-idf-sys") {
                    invalidate_stale_sdkconfig(&build.join("out/esp-idf"), &sdkconfig_defaults);
                }
            }
        }
    }

    embuild::espidf::sysenv::output();
}

fn invalidate_stale_sdkconfig(idf_out: &Path, defaults: &Path) {
    let modified = |path: &Path| fs::metadata(path).and_then(|meta| meta.modified()).ok();
    let sdkconfig = idf_out.join("sdkconfig");
    if let (Some(generated), Some(edited)) = (modified(&sdkconfig), modified(defaults)) {
        if edited > generated {
            eprintln!("sdkconfig.defaults changed! Forcing regeneration...");
            let _ = fs::remove_file(&sdkconfig);
            let _ = fs::remove_dir_all(idf_out.join("sdkconfig.d"));
        }
    }
}
