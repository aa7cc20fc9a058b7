#[cfg(feature = "shaderc")]
extern crate shaderc;

#[allow(unused_imports)]
use std::env;
#[allow(unused_imports)]
use std::fs::File;
#[allow(unused_imports)]
use std::io::{Read, Write};
#[allow(unused_imports)]
use std::path::{Path, PathBuf};

#[cfg(feature = "shaderc")]
fn load_file(path: &Path) -> String {
    let mut out = String::new();
    File::open(path).unwrap().read_to_string(&mut out).unwrap();
    out
}

#[cfg(feature = "shaderc")]
fn save_file(path: &Path, binary: &[u8]) {
    File::create(path).unwrap().write_all(binary).unwrap();
}

#[cfg(feature = "shaderc")]
fn compile_shader(path: &Path, kind: shaderc::ShaderKind, defines: &[(&str, Option<&str>)], output: &Path) {
    let compiler = shaderc::Compiler::new().unwrap();
    let mut options = shaderc::CompileOptions::new().unwrap();
    for (name, value) in defines {
        options.add_macro_definition(name, *value);
    }
    let binary = compiler
        .compile_into_spirv(
            &load_file(path),
            kind,
            path.as_os_str().to_str().unwrap(),
            "main",
            Some(&options),
        )
        .unwrap();
    save_file(output, binary.as_binary_u8());
}

/// Compiles the copy/readback library's compute shader bank: the
/// sampled-copy shader is built once per `DescriptorCategory` scalar kind
/// (float/uint/int), and the accel-struct vertex-normalization shader once.
/// Output goes to `OUT_DIR` and is picked up via `include_bytes!` in
/// `src/copy.rs`.
#[cfg(feature = "shaderc")]
fn compile_shaders() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    println!("cargo:rerun-if-changed=shaders/sampled_copy.comp");
    println!("cargo:rerun-if-changed=shaders/normalize_vertices.comp");

    for (kind_name, define) in [("float", "0"), ("uint", "1"), ("int", "2")] {
        compile_shader(
            Path::new("shaders/sampled_copy.comp"),
            shaderc::ShaderKind::Compute,
            &[("SCALAR_KIND", Some(define))],
            &out_dir.join(format!("sampled_copy_{kind_name}.spv")),
        );
    }

    compile_shader(
        Path::new("shaders/normalize_vertices.comp"),
        shaderc::ShaderKind::Compute,
        &[],
        &out_dir.join("normalize_vertices.spv"),
    );
}

fn main() {
    #[cfg(feature = "shaderc")]
    compile_shaders();
}
