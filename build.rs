fn main() {
    println!("cargo:rerun-if-changed=src/session.proto");

    prost_build::compile_protos(&["src/session.proto"], &["src/"])
        .expect("Failed to generate protobuf code");
}
