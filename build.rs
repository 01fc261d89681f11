/// Build script for LumeRender
///
/// # Shader Compilation Strategy:
/// - HLSL shaders are compiled at runtime via D3DCompile; the build
///   script only triggers a rebuild when shader or manifest files change.
fn main() {
    println!("cargo:rerun-if-changed=assets/shaders/gui.hlsl");
    println!("cargo:rerun-if-changed=assets/resources.toml");
}
