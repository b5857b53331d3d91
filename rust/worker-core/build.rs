fn main() {
    #[cfg(feature = "grpc")]
    {
        let proto_file = "../../proto/coordinator.proto";
        let proto_dir = "../../proto";
        let out_dir = "src/registration/proto";

        // Rerun if proto file changes
        println!("cargo:rerun-if-changed={}", proto_file);

        std::fs::create_dir_all(out_dir).expect("Failed to create proto output directory");

        // The server half is only used by the in-process coordinators in tests.
        tonic_build::configure()
            .build_server(true)
            .build_client(true)
            .out_dir(out_dir)
            .compile_protos(&[proto_file], &[proto_dir])
            .expect("Failed to compile coordinator.proto");
    }
}
