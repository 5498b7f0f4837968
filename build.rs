fn main() {
    #[cfg(feature = "spcm")]
    spcm::generate();
}

#[cfg(feature = "spcm")]
mod spcm {
    use std::{env, path::PathBuf};

    pub fn generate() {
        let include_dir =
            env::var("SPCM_INCLUDE_DIR").unwrap_or_else(|_| "/usr/include/spcm".to_string());
        println!("cargo:rerun-if-env-changed=SPCM_INCLUDE_DIR");
        println!("cargo:rerun-if-env-changed=SPCM_LIB_DIR");
        println!("cargo:rerun-if-changed=wrapper.h");

        if let Ok(lib_dir) = env::var("SPCM_LIB_DIR") {
            println!("cargo:rustc-link-search=native={lib_dir}");
        }
        if cfg!(target_os = "windows") {
            println!("cargo:rustc-link-lib=dylib=spcm_win64");
        } else {
            println!("cargo:rustc-link-lib=dylib=spcm_linux");
        }

        let bindings = bindgen::Builder::default()
            .header("wrapper.h")
            .clang_arg(format!("-I{include_dir}"))
            .allowlist_function("spcm_.*")
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .generate()
            .expect("unable to generate spcm bindings");

        let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
        bindings
            .write_to_file(out_path.join("bindings.rs"))
            .expect("couldn't write bindings");
    }
}
