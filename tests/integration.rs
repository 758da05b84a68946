use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[sensor]\n"
        + "ray_count = 9\n"
        + "ray_length = 250.0\n"
        + "ray_spread = 2.356\n"
        + "\n"
        + "[network]\n"
        + "hidden_layers = [6]\n"
        + "\n"
        + "[evolution]\n"
        + "population = 40\n"
        + "restart_delay_ms = 10\n"
        + "max_frames = 400\n"
        + "seed = 7\n"
        + "\n"
        + "[road]\n"
        + "width = 252.0\n"
        + "lane_count = 3\n"
        + "\n"
        + "[car]\n"
        + "width = 30.0\n"
        + "height = 50.0\n"
        + "max_speed = 3.5\n"
        + "acceleration = 0.2\n"
        + "friction = 0.05\n"
        + "start_lane = 1\n"
        + "start_y = 100.0\n"
        + "\n"
        + "[traffic]\n"
        + "max_speed = 2.0\n"
        + "cars = [\n"
        + "    { lane = 1, y = -100.0 },\n"
        + "    { lane = 0, y = -300.0 },\n"
        + "    { lane = 2, y = -300.0 },\n"
        + "    { lane = 0, y = -500.0 },\n"
        + "    { lane = 1, y = -500.0 },\n"
        + "]\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_neurodrive"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "run", "--generations", "2"]);
    assert!(test_dir.join("brain.json").is_file());
    assert!(test_dir.join("session-0000.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "run", "--generations", "2"]);
    assert!(test_dir.join("session-0001.msgpack").is_file());

    fs::write(test_dir.join("brain.json"), "{ not a brain").expect("failed to corrupt brain");
    run_bin(&["--sim-dir", test_dir_str, "run", "--generations", "1"]);
    assert!(test_dir.join("session-0002.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    let results = fs::read_to_string(test_dir.join("results.json"))
        .expect("failed to read results file");
    let results: serde_json::Value =
        serde_json::from_str(&results).expect("failed to parse results file");
    assert_eq!(results["generations"], 5);

    run_bin(&["--sim-dir", test_dir_str, "discard"]);
    assert!(!test_dir.join("brain.json").exists());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("session-0000.msgpack").exists());
    assert!(!test_dir.join("results.json").exists());
    assert!(test_dir.join("config.toml").is_file());

    fs::remove_dir_all(&test_dir).ok();
}
