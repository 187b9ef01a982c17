//! Integration tests for the `jbridge` binary.

use std::process::{Command, Output};

fn jbridge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jbridge"))
        .args(args)
        .env_remove("JBRIDGE_LOG")
        .output()
        .expect("failed to run jbridge")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_layout() {
    let out = jbridge(&["layout"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("thread.state"));
    assert!(text.contains("env.local_ref_cookie"));
    assert!(text.contains("frame.header_size"));
}

#[test]
fn test_emit_prints_ir() {
    let out = jbridge(&["emit", "static Lcom/example/Calc;->add(II)I"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains("jbridge_Java_com_example_Calc_add__II"));
    assert!(text.contains("shorty=III slots=1"));
    assert!(text.contains("call_indirect"));
}

#[test]
fn test_emit_rejects_bad_descriptor() {
    let out = jbridge(&["emit", "LA;->f(Q)V"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Malformed descriptor"));
}

#[test]
fn test_object_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridges.o");
    let path_str = path.to_str().unwrap();

    let out = jbridge(&[
        "object",
        "-o",
        path_str,
        "--opt-level",
        "speed-and-size",
        "static LCalc;->add(II)I",
        "LMap;->get(Ljava/lang/Object;)Ljava/lang/Object;",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("Wrote 2 bridge(s)"));

    let bytes = std::fs::read(&path).unwrap();
    assert!(!bytes.is_empty());
}

#[test]
fn test_object_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("jbridge.toml");
    std::fs::write(&config, "opt_level = \"none\"\nverify = true\n").unwrap();
    let output = dir.path().join("out.o");

    let out = jbridge(&[
        "object",
        "--config",
        config.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "LWorker;->run()V",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(output.exists());
}
