use std::fs;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn legal(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_legal"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch interpreter")
}

#[test]
fn runs_program_and_exits_cleanly() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("LICENSE.lspl"),
        "BEGIN_LICENSE_AGREEMENT\n\
         SUMMON defendant\n\
         defendant = 3 * 2 + 1\n\
         DELIVER VERDICT Value is (defendant)\n\
         WRITE_VERDICT verdict.txt\n\
         CASE_DISMISSED\n\
         END_LICENSE_AGREEMENT\n",
    )
    .unwrap();

    let output = legal(dir.path(), &["LICENSE"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Value is 7.\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("verdict.txt")).unwrap(),
        "Value is 7.\n"
    );
}

#[test]
fn parse_errors_exit_65_with_location() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("broken.lspl"),
        "BEGIN_LICENSE_AGREEMENT\nIF 1 > 0\nEND_LICENSE_AGREEMENT\n",
    )
    .unwrap();

    let output = legal(dir.path(), &["broken.lspl"]);

    assert_eq!(output.status.code(), Some(65));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[line 3:1] ParseError:"), "{}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn runtime_errors_exit_70() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("loop.lspl"),
        "BEGIN_LICENSE_AGREEMENT\nCOMMENCE LEGAL_LOOPHOLE\nSUMMON x\nEND LEGAL_LOOPHOLE\nEND_LICENSE_AGREEMENT\n",
    )
    .unwrap();

    let output = legal(dir.path(), &["--max-iterations", "5", "loop.lspl"]);

    assert_eq!(output.status.code(), Some(70));
    assert!(String::from_utf8_lossy(&output.stderr).contains("LoopLimitError"));
}

#[test]
fn missing_source_exits_74() {
    let dir = tempdir().unwrap();

    let output = legal(dir.path(), &["nowhere"]);

    assert_eq!(output.status.code(), Some(74));
    assert!(String::from_utf8_lossy(&output.stderr).contains("IOError"));
}

#[test]
fn ast_flag_prints_tree_without_running() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("tree.lspl"),
        "BEGIN_LICENSE_AGREEMENT\nDELIVER VERDICT hi\nEND_LICENSE_AGREEMENT\n",
    )
    .unwrap();

    let output = legal(dir.path(), &["--ast", "tree.lspl"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "(verdict \"hi\")\n");
}

#[test]
fn path_argument_is_required() {
    let dir = tempdir().unwrap();

    let output = legal(dir.path(), &[]);

    assert!(!output.status.success());
}
