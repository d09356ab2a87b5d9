use std::fs;
use std::path::Path;

use legal::run::{run_file_with, run_source};
use legal::{Config, Evaluate, Value};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

fn court() -> (TempDir, Config) {
    let dir = tempdir().unwrap();
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    (dir, config)
}

fn file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn run_in(config: Config, source: &str) -> Result<Evaluate<Vec<u8>>, legal::Error> {
    run_source(source, config, Vec::new())
}

fn stdout(evaluate: &Evaluate<Vec<u8>>) -> String {
    String::from_utf8(evaluate.output().clone()).unwrap()
}

const SENTENCING: &str = "\
BEGIN_LICENSE_AGREEMENT
COMMENCE_LEGAL_PROCEEDINGS
READ_EVIDENCE statutes
SWEAR final_sentence TO 25
reduce_sentence
DELIVER VERDICT The defendant will serve (final_sentence) years.
WRITE_VERDICT verdict.txt
CASE_DISMISSED
END_LICENSE_AGREEMENT
";

const STATUTES: &str = "\
BEGIN_LICENSE_AGREEMENT
DEFINE STATUTE reduce_sentence
  COMMENCE LEGAL_LOOPHOLE UNTIL final_sentence <= 20
    final_sentence = final_sentence - 1
    DELIVER VERDICT Sentence reduced to (final_sentence)
  END LEGAL_LOOPHOLE
END STATUTE
END_LICENSE_AGREEMENT
";

#[test]
fn evidence_statutes_become_invocable() {
    let (dir, config) = court();
    file(dir.path(), "statutes.lspl", STATUTES);

    let evaluate = run_in(config, SENTENCING).unwrap();

    assert!(evaluate.statutes().contains("reduce_sentence"));
    assert_eq!(
        evaluate.environment().lookup("final_sentence"),
        Some(&Value::Number(20.0))
    );
    assert_eq!(
        stdout(&evaluate),
        "Sentence reduced to 24.\n\
         Sentence reduced to 23.\n\
         Sentence reduced to 22.\n\
         Sentence reduced to 21.\n\
         Sentence reduced to 20.\n\
         The defendant will serve 20 years.\n"
    );
}

#[test]
fn written_verdict_matches_delivered_lines() {
    let (dir, config) = court();
    file(dir.path(), "statutes.lspl", STATUTES);

    let evaluate = run_in(config, SENTENCING).unwrap();

    let written = fs::read_to_string(dir.path().join("verdict.txt")).unwrap();
    let expected: String = evaluate
        .verdicts()
        .lines()
        .iter()
        .map(|line| format!("{}\n", line))
        .collect();
    assert_eq!(written, expected);
    assert_eq!(written, stdout(&evaluate));
}

#[test]
fn verdict_file_holds_only_lines_delivered_before_the_write() {
    let (dir, config) = court();
    let source = "\
BEGIN_LICENSE_AGREEMENT
DELIVER VERDICT First
WRITE_VERDICT early.txt
DELIVER VERDICT Second
WRITE_VERDICT late.txt
END_LICENSE_AGREEMENT
";
    run_in(config, source).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("early.txt")).unwrap(),
        "First.\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("late.txt")).unwrap(),
        "First.\nSecond.\n"
    );
}

#[test]
fn failed_write_keeps_earlier_verdict_files() {
    let (dir, config) = court();
    let source = "\
BEGIN_LICENSE_AGREEMENT
DELIVER VERDICT Guilty
WRITE_VERDICT kept.txt
WRITE_VERDICT no/such/dir/verdict.txt
END_LICENSE_AGREEMENT
";
    let error = run_in(config, source).err().unwrap();

    assert_eq!(error.kind(), "IOError");
    assert_eq!(error.exit_code(), 74);
    assert!(error.to_string().starts_with("[line 4:1] IOError:"));
    assert_eq!(
        fs::read_to_string(dir.path().join("kept.txt")).unwrap(),
        "Guilty.\n"
    );
}

#[test]
fn evidence_data_file_loads_variables() {
    let (dir, config) = court();
    file(
        dir.path(),
        "case_facts.txt",
        "defendant = \"John Doe\"\n\nstolen_goods = 12.5\n",
    );
    let source = "\
BEGIN_LICENSE_AGREEMENT
READ_EVIDENCE case_facts.txt
fine = stolen_goods * 2
DELIVER VERDICT (defendant) owes (fine) dollars
END_LICENSE_AGREEMENT
";
    let evaluate = run_in(config, source).unwrap();

    assert_eq!(evaluate.verdicts().lines(), ["John Doe owes 25 dollars."]);
}

#[test]
fn malformed_evidence_data_is_reported_with_its_file() {
    let (dir, config) = court();
    file(dir.path(), "facts.txt", "witness = 3\nthis line has no value\n");
    let source = "BEGIN_LICENSE_AGREEMENT\nREAD_EVIDENCE facts.txt\nEND_LICENSE_AGREEMENT\n";

    let error = run_in(config, source).err().unwrap();

    assert_eq!(error.kind(), "ParseError");
    let message = error.to_string();
    assert!(message.starts_with("[line 2:1] ParseError:"), "{}", message);
    assert!(message.contains("facts.txt"), "{}", message);
}

#[test]
fn missing_evidence_is_an_io_error() {
    let (_dir, config) = court();
    let source = "BEGIN_LICENSE_AGREEMENT\nREAD_EVIDENCE exhibit_a\nEND_LICENSE_AGREEMENT\n";

    let error = run_in(config, source).err().unwrap();

    assert_eq!(error.kind(), "IOError");
    assert!(error.to_string().contains("exhibit_a"));
}

#[test]
fn evidence_with_syntax_errors_fails_before_running_any_of_it() {
    let (dir, config) = court();
    file(
        dir.path(),
        "bad.lspl",
        "BEGIN_LICENSE_AGREEMENT\nDELIVER VERDICT partial\nEND STATUTE\nEND_LICENSE_AGREEMENT\n",
    );
    let source = "BEGIN_LICENSE_AGREEMENT\nREAD_EVIDENCE bad.lspl\nEND_LICENSE_AGREEMENT\n";

    let error = run_in(config, source).err().unwrap();

    assert_eq!(error.kind(), "ParseError");
    assert_eq!(error.exit_code(), 65);
}

#[test]
fn circular_evidence_is_rejected() {
    let (dir, config) = court();
    file(
        dir.path(),
        "a.lspl",
        "BEGIN_LICENSE_AGREEMENT\nREAD_EVIDENCE b.lspl\nEND_LICENSE_AGREEMENT\n",
    );
    file(
        dir.path(),
        "b.lspl",
        "BEGIN_LICENSE_AGREEMENT\nREAD_EVIDENCE a.lspl\nEND_LICENSE_AGREEMENT\n",
    );
    let source = "BEGIN_LICENSE_AGREEMENT\nREAD_EVIDENCE a.lspl\nEND_LICENSE_AGREEMENT\n";

    let error = run_in(config, source).err().unwrap();

    assert_eq!(error.kind(), "IOError");
    assert!(error.to_string().contains("already being read"));
}

#[test]
fn program_cannot_read_itself_as_evidence() {
    let (dir, config) = court();
    file(
        dir.path(),
        "LICENSE.lspl",
        "BEGIN_LICENSE_AGREEMENT\nDELIVER VERDICT Opening\nREAD_EVIDENCE LICENSE\nEND_LICENSE_AGREEMENT\n",
    );
    let mut echoed = Vec::new();
    let evaluate = Evaluate::with_output(config, &mut echoed);

    let error = run_file_with(&dir.path().join("LICENSE"), evaluate)
        .err()
        .unwrap();

    assert_eq!(error.kind(), "IOError");
    assert!(error.to_string().starts_with("[line 3:1] IOError: Evidence file"));
    assert_eq!(String::from_utf8(echoed).unwrap(), "Opening.\n");
}

#[test]
fn same_evidence_read_twice_redefines_its_statutes() {
    let (dir, config) = court();
    file(dir.path(), "statutes.lspl", STATUTES);
    let source = "\
BEGIN_LICENSE_AGREEMENT
READ_EVIDENCE statutes.lspl
READ_EVIDENCE statutes.lspl
END_LICENSE_AGREEMENT
";
    let error = run_in(config, source).err().unwrap();

    assert_eq!(error.kind(), "RedefinitionError");
}

#[test]
fn dismissal_in_evidence_halts_the_whole_program() {
    let (dir, config) = court();
    file(
        dir.path(),
        "settlement.lspl",
        "BEGIN_LICENSE_AGREEMENT\nDELIVER VERDICT Settled out of court\nCASE_DISMISSED\nEND_LICENSE_AGREEMENT\n",
    );
    let source = "\
BEGIN_LICENSE_AGREEMENT
READ_EVIDENCE settlement.lspl
DELIVER VERDICT The trial continues
END_LICENSE_AGREEMENT
";
    let evaluate = run_in(config, source).unwrap();

    assert_eq!(evaluate.verdicts().lines(), ["Settled out of court."]);
}

#[test]
fn invocation_twice_sees_updated_state() {
    let (_dir, config) = court();
    let source = "\
BEGIN_LICENSE_AGREEMENT
SUMMON count
DEFINE STATUTE testify
  SENTENCE count
  DELIVER VERDICT Witness number (count) testifies
END STATUTE
testify
testify
END_LICENSE_AGREEMENT
";
    let evaluate = run_in(config, source).unwrap();

    assert_eq!(
        evaluate.verdicts().lines(),
        ["Witness number 1 testifies.", "Witness number 2 testifies."]
    );
    assert_eq!(evaluate.environment().len(), 1);
}

#[test]
fn program_without_wrapper_runs_nothing() {
    let (dir, config) = court();
    let source = "DELIVER VERDICT Hello\nWRITE_VERDICT out.txt\nEND_LICENSE_AGREEMENT\n";

    let error = run_in(config, source).err().unwrap();

    assert_eq!(error.kind(), "ParseError");
    assert!(!dir.path().join("out.txt").exists());
}

#[test]
fn runtime_error_after_output_keeps_what_was_echoed() {
    let (_dir, config) = court();
    let source = "\
BEGIN_LICENSE_AGREEMENT
DELIVER VERDICT Opening statement
x = missing + 1
END_LICENSE_AGREEMENT
";
    let error = run_in(config, source).err().unwrap();

    assert_eq!(
        error.to_string(),
        "[line 3:5] NameError: Undefined variable 'missing'."
    );
    assert_eq!(error.exit_code(), 70);
}
