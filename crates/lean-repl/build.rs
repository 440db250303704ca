fn main() {
    // Lets `discover_repl` find `vendor/repl` relative to this crate.
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    println!("cargo:rustc-env=LEAN_REPL_MANIFEST_DIR={manifest_dir}");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=LEAN_REPL_PROJECT");
}
